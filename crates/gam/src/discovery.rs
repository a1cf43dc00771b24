use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use salesagent_core::TenantId;
use salesagent_inventory::{DiscoveredItem, DiscoveryError, InventoryDiscovery, InventoryItemType};

use crate::client::GamClient;
use crate::error::GamError;

/// Ad Manager PQL filter statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PqlStatement(String);

impl PqlStatement {
    /// Every item, ordered by id.
    pub fn all() -> Self {
        Self("ORDER BY id ASC".to_string())
    }

    /// Items modified at or after `since`, truncated to the second (network
    /// time is UTC here). Items from that second are fetched again; upserts
    /// make that harmless.
    pub fn modified_since(since: DateTime<Utc>) -> Self {
        Self(format!(
            "WHERE lastModifiedDateTime >= '{}' ORDER BY id ASC",
            since.format("%Y-%m-%dT%H:%M:%S")
        ))
    }

    pub fn for_since(since: Option<DateTime<Utc>>) -> Self {
        since.map_or_else(Self::all, Self::modified_since)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// [`InventoryDiscovery`] backed by one Ad Manager network.
pub struct GamInventoryDiscovery {
    client: Arc<dyn GamClient>,
    network_code: String,
}

impl GamInventoryDiscovery {
    pub fn new(client: Arc<dyn GamClient>, network_code: impl Into<String>) -> Self {
        Self {
            client,
            network_code: network_code.into(),
        }
    }
}

impl From<GamError> for DiscoveryError {
    fn from(e: GamError) -> Self {
        match e {
            GamError::Rpc(msg) => DiscoveryError::Rpc(msg),
            other => DiscoveryError::InvalidResponse(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl InventoryDiscovery for GamInventoryDiscovery {
    async fn discover(
        &self,
        tenant_id: TenantId,
        item_type: InventoryItemType,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DiscoveredItem>, DiscoveryError> {
        let statement = PqlStatement::for_since(since);
        debug!(%tenant_id, %item_type, statement = statement.as_str(), "fetching inventory");

        let items = self
            .client
            .fetch_inventory(&self.network_code, item_type, &statement)
            .await?;

        if let Some(bad) = items.iter().find(|i| i.item_type != item_type) {
            return Err(DiscoveryError::InvalidResponse(format!(
                "asked for {item_type}, received {}",
                bad.item_type
            )));
        }
        Ok(items)
    }
}
