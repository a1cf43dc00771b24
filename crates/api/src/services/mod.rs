//! Request services. Each call resolves the tenant from the request context,
//! runs the domain logic and persists through the configured stores.

mod inventory;
mod media_buys;
mod products;

pub use media_buys::{CreateMediaBuyRequest, MediaBuyResponse};
pub use products::{GetProductsRequest, PublishProductRequest};

use std::sync::Arc;

use salesagent_infra::{
    AdServerRegistry, InventorySyncScheduler, SchedulerConfig, Stores, TenantConfig,
    TenantResolver,
};
use salesagent_inventory::{InventorySyncController, SyncPolicy};

use crate::context::RequestContext;
use crate::error::ApiError;

#[derive(Clone)]
pub struct SalesAgent {
    tenants: Arc<dyn TenantResolver>,
    stores: Stores,
    ad_servers: AdServerRegistry,
    sync: Arc<InventorySyncController>,
}

impl SalesAgent {
    pub fn new(
        tenants: Arc<dyn TenantResolver>,
        stores: Stores,
        ad_servers: AdServerRegistry,
        sync_policy: SyncPolicy,
    ) -> Self {
        let sync = Arc::new(InventorySyncController::new(
            Arc::clone(&stores.inventory),
            sync_policy,
        ));
        Self {
            tenants,
            stores,
            ad_servers,
            sync,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Background scheduler sharing this agent's controller, so manual and
    /// scheduled syncs of one tenant never overlap.
    pub fn scheduler(&self, config: SchedulerConfig) -> InventorySyncScheduler {
        InventorySyncScheduler::new(
            Arc::clone(&self.sync),
            Arc::clone(&self.tenants),
            self.ad_servers.clone(),
            config,
        )
    }

    async fn tenant(&self, ctx: &RequestContext) -> Result<TenantConfig, ApiError> {
        Ok(self.tenants.resolve(ctx.tenant_id()).await?)
    }
}
