//! Inventory persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use salesagent_core::TenantId;

use crate::item::{DiscoveredItem, InventoryItem, InventoryItemStatus, InventoryItemType};
use crate::run::{SyncRun, SyncRunId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum InventoryStoreError {
    #[error("tenant isolation violation")]
    TenantIsolation,
    #[error("storage error: {0}")]
    Storage(String),
}

/// Tenant-scoped inventory mirror plus sync run history.
#[async_trait::async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert or refresh observed items, setting them active with
    /// `last_synced_at = synced_at`. Returns the number of items written.
    async fn upsert_items(
        &self,
        tenant_id: TenantId,
        items: &[DiscoveredItem],
        synced_at: DateTime<Utc>,
    ) -> Result<u64, InventoryStoreError>;

    /// Mark every active item of `item_types` last synced before
    /// `observed_before` as stale, atomically. Returns the number marked.
    async fn mark_stale(
        &self,
        tenant_id: TenantId,
        item_types: &[InventoryItemType],
        observed_before: DateTime<Utc>,
    ) -> Result<u64, InventoryStoreError>;

    /// Start time of the latest run that completed without failed types.
    async fn last_successful_sync(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<DateTime<Utc>>, InventoryStoreError>;

    /// Insert or update a run record.
    async fn save_run(&self, run: &SyncRun) -> Result<(), InventoryStoreError>;

    async fn get_run(
        &self,
        tenant_id: TenantId,
        run_id: SyncRunId,
    ) -> Result<Option<SyncRun>, InventoryStoreError>;

    async fn list_items(
        &self,
        tenant_id: TenantId,
        item_type: Option<InventoryItemType>,
    ) -> Result<Vec<InventoryItem>, InventoryStoreError>;
}

#[async_trait::async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn upsert_items(
        &self,
        tenant_id: TenantId,
        items: &[DiscoveredItem],
        synced_at: DateTime<Utc>,
    ) -> Result<u64, InventoryStoreError> {
        (**self).upsert_items(tenant_id, items, synced_at).await
    }

    async fn mark_stale(
        &self,
        tenant_id: TenantId,
        item_types: &[InventoryItemType],
        observed_before: DateTime<Utc>,
    ) -> Result<u64, InventoryStoreError> {
        (**self).mark_stale(tenant_id, item_types, observed_before).await
    }

    async fn last_successful_sync(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<DateTime<Utc>>, InventoryStoreError> {
        (**self).last_successful_sync(tenant_id).await
    }

    async fn save_run(&self, run: &SyncRun) -> Result<(), InventoryStoreError> {
        (**self).save_run(run).await
    }

    async fn get_run(
        &self,
        tenant_id: TenantId,
        run_id: SyncRunId,
    ) -> Result<Option<SyncRun>, InventoryStoreError> {
        (**self).get_run(tenant_id, run_id).await
    }

    async fn list_items(
        &self,
        tenant_id: TenantId,
        item_type: Option<InventoryItemType>,
    ) -> Result<Vec<InventoryItem>, InventoryStoreError> {
        (**self).list_items(tenant_id, item_type).await
    }
}

type ItemKey = (TenantId, InventoryItemType, String);

/// In-memory inventory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    items: RwLock<HashMap<ItemKey, InventoryItem>>,
    runs: RwLock<HashMap<SyncRunId, SyncRun>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned<T>(_: T) -> InventoryStoreError {
    InventoryStoreError::Storage("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn upsert_items(
        &self,
        tenant_id: TenantId,
        items: &[DiscoveredItem],
        synced_at: DateTime<Utc>,
    ) -> Result<u64, InventoryStoreError> {
        let mut stored = self.items.write().map_err(poisoned)?;
        for item in items {
            let key = (tenant_id, item.item_type, item.external_id.clone());
            stored.insert(key, InventoryItem::observed(tenant_id, item, synced_at));
        }
        Ok(items.len() as u64)
    }

    async fn mark_stale(
        &self,
        tenant_id: TenantId,
        item_types: &[InventoryItemType],
        observed_before: DateTime<Utc>,
    ) -> Result<u64, InventoryStoreError> {
        // One write lock for the whole pass.
        let mut stored = self.items.write().map_err(poisoned)?;
        let mut marked = 0;
        for item in stored.values_mut() {
            if item.tenant_id == tenant_id
                && item_types.contains(&item.item_type)
                && item.status == InventoryItemStatus::Active
                && item.last_synced_at < observed_before
            {
                item.status = InventoryItemStatus::Stale;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn last_successful_sync(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<DateTime<Utc>>, InventoryStoreError> {
        let runs = self.runs.read().map_err(poisoned)?;
        Ok(runs
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.is_clean_success())
            .map(|r| r.started_at)
            .max())
    }

    async fn save_run(&self, run: &SyncRun) -> Result<(), InventoryStoreError> {
        let mut runs = self.runs.write().map_err(poisoned)?;
        if let Some(existing) = runs.get(&run.id) {
            if existing.tenant_id != run.tenant_id {
                return Err(InventoryStoreError::TenantIsolation);
            }
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(
        &self,
        tenant_id: TenantId,
        run_id: SyncRunId,
    ) -> Result<Option<SyncRun>, InventoryStoreError> {
        let runs = self.runs.read().map_err(poisoned)?;
        match runs.get(&run_id) {
            Some(run) if run.tenant_id != tenant_id => Err(InventoryStoreError::TenantIsolation),
            other => Ok(other.cloned()),
        }
    }

    async fn list_items(
        &self,
        tenant_id: TenantId,
        item_type: Option<InventoryItemType>,
    ) -> Result<Vec<InventoryItem>, InventoryStoreError> {
        let stored = self.items.read().map_err(poisoned)?;
        let mut items: Vec<InventoryItem> = stored
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .filter(|i| item_type.is_none_or(|t| i.item_type == t))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            (a.item_type, &a.external_id).cmp(&(b.item_type, &b.external_id))
        });
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::SyncMode;
    use chrono::Duration;

    fn ad_unit(id: &str) -> DiscoveredItem {
        DiscoveredItem::new(InventoryItemType::AdUnit, id, format!("Ad unit {id}"))
    }

    #[tokio::test]
    async fn mark_stale_only_touches_requested_types_and_older_items() {
        let store = InMemoryInventoryStore::new();
        let tenant = TenantId::new();
        let earlier = Utc::now() - Duration::hours(1);
        let now = Utc::now();

        store
            .upsert_items(tenant, &[ad_unit("1"), ad_unit("2")], earlier)
            .await
            .unwrap();
        store
            .upsert_items(
                tenant,
                &[DiscoveredItem::new(InventoryItemType::Label, "l1", "Label")],
                earlier,
            )
            .await
            .unwrap();
        store.upsert_items(tenant, &[ad_unit("2")], now).await.unwrap();

        let marked = store
            .mark_stale(tenant, &[InventoryItemType::AdUnit], now)
            .await
            .unwrap();
        assert_eq!(marked, 1);

        let items = store.list_items(tenant, None).await.unwrap();
        let stale: Vec<&str> = items
            .iter()
            .filter(|i| i.is_stale())
            .map(|i| i.external_id.as_str())
            .collect();
        assert_eq!(stale, vec!["1"]);
    }

    #[tokio::test]
    async fn mark_stale_is_tenant_scoped() {
        let store = InMemoryInventoryStore::new();
        let a = TenantId::new();
        let b = TenantId::new();
        let earlier = Utc::now() - Duration::hours(1);
        store.upsert_items(a, &[ad_unit("1")], earlier).await.unwrap();
        store.upsert_items(b, &[ad_unit("1")], earlier).await.unwrap();

        store
            .mark_stale(a, &InventoryItemType::ALL, Utc::now())
            .await
            .unwrap();

        assert!(store.list_items(b, None).await.unwrap().iter().all(|i| !i.is_stale()));
    }

    #[tokio::test]
    async fn reobserved_stale_item_becomes_active() {
        let store = InMemoryInventoryStore::new();
        let tenant = TenantId::new();
        store
            .upsert_items(tenant, &[ad_unit("1")], Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        store
            .mark_stale(tenant, &[InventoryItemType::AdUnit], Utc::now())
            .await
            .unwrap();
        store.upsert_items(tenant, &[ad_unit("1")], Utc::now()).await.unwrap();

        let items = store
            .list_items(tenant, Some(InventoryItemType::AdUnit))
            .await
            .unwrap();
        assert_eq!(items[0].status, InventoryItemStatus::Active);
    }

    #[tokio::test]
    async fn last_successful_sync_ignores_failed_and_partial_runs() {
        let store = InMemoryInventoryStore::new();
        let tenant = TenantId::new();

        let mut clean = SyncRun::start(tenant, SyncMode::Full, SyncMode::Full, None);
        clean.record_type_success(InventoryItemType::AdUnit, 1);
        clean.mark_completed(0);
        store.save_run(&clean).await.unwrap();

        let mut partial = SyncRun::start(tenant, SyncMode::Full, SyncMode::Full, None);
        partial.record_type_failure(InventoryItemType::AdUnit, "boom".into());
        partial.record_type_success(InventoryItemType::Label, 1);
        partial.mark_completed(0);
        store.save_run(&partial).await.unwrap();

        let mut failed = SyncRun::start(tenant, SyncMode::Full, SyncMode::Full, None);
        failed.mark_failed("all item types failed");
        store.save_run(&failed).await.unwrap();

        assert_eq!(
            store.last_successful_sync(tenant).await.unwrap(),
            Some(clean.started_at)
        );
        assert_eq!(store.last_successful_sync(TenantId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_run_enforces_tenant() {
        let store = InMemoryInventoryStore::new();
        let tenant = TenantId::new();
        let run = SyncRun::start(tenant, SyncMode::Full, SyncMode::Full, None);
        store.save_run(&run).await.unwrap();

        assert!(store.get_run(tenant, run.id).await.unwrap().is_some());
        assert!(matches!(
            store.get_run(TenantId::new(), run.id).await,
            Err(InventoryStoreError::TenantIsolation)
        ));
    }
}
