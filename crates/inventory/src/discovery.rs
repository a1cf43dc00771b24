use chrono::{DateTime, Utc};
use thiserror::Error;

use salesagent_core::TenantId;

use crate::item::{DiscoveredItem, InventoryItemType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("ad server request failed: {0}")]
    Rpc(String),

    #[error("item type {0} is not supported by this ad server")]
    Unsupported(InventoryItemType),

    #[error("unexpected ad server response: {0}")]
    InvalidResponse(String),
}

/// Source of ad-server inventory for one tenant.
///
/// `since = None` asks for every item of the type; `Some(t)` asks only for
/// items modified after `t`.
#[async_trait::async_trait]
pub trait InventoryDiscovery: Send + Sync {
    async fn discover(
        &self,
        tenant_id: TenantId,
        item_type: InventoryItemType,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DiscoveredItem>, DiscoveryError>;
}
