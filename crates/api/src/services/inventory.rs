use tokio_util::sync::CancellationToken;
use tracing::instrument;

use salesagent_inventory::{
    InventoryItem, InventoryItemType, SyncMode, SyncRequest, SyncRun, SyncRunId,
};

use super::SalesAgent;
use crate::context::RequestContext;
use crate::error::ApiError;

impl SalesAgent {
    /// Run an inventory sync for the caller's tenant and wait for it.
    ///
    /// Failed, timed-out and cancelled runs are returned as runs with that
    /// status; refusals (unsupported adapter, sync already running, no prior
    /// sync under the reject policy) are errors.
    #[instrument(skip(self, ctx, cancel), fields(tenant_id = %ctx.tenant_id(), mode = %mode), err)]
    pub async fn sync_inventory(
        &self,
        ctx: &RequestContext,
        mode: SyncMode,
        cancel: &CancellationToken,
    ) -> Result<SyncRun, ApiError> {
        let tenant = self.tenant(ctx).await?;
        let discovery = self.ad_servers.discovery_for(&tenant)?;
        let request = SyncRequest {
            tenant_id: tenant.tenant_id,
            adapter: tenant.adapter.clone(),
            mode,
        };
        Ok(self.sync.run(request, discovery.as_ref(), cancel).await?)
    }

    pub async fn get_sync_run(
        &self,
        ctx: &RequestContext,
        run_id: SyncRunId,
    ) -> Result<SyncRun, ApiError> {
        self.stores
            .inventory
            .get_run(ctx.tenant_id(), run_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("sync run {run_id} not found")))
    }

    pub async fn list_inventory(
        &self,
        ctx: &RequestContext,
        item_type: Option<InventoryItemType>,
    ) -> Result<Vec<InventoryItem>, ApiError> {
        Ok(self
            .stores
            .inventory
            .list_items(ctx.tenant_id(), item_type)
            .await?)
    }
}
