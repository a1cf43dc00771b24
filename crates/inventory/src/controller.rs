//! Full/incremental inventory sync with staleness marking.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use salesagent_channels::AdapterType;
use salesagent_core::{DomainError, TenantId};

use crate::discovery::InventoryDiscovery;
use crate::item::InventoryItemType;
use crate::run::{SyncMode, SyncRun};
use crate::store::{InventoryStore, InventoryStoreError};

/// What to do with an incremental request when no prior sync succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IncrementalFallback {
    /// Run a full sync instead, recorded as a downgrade on the run.
    #[default]
    RunFull,
    /// Refuse with [`SyncError::NoPriorSync`].
    Reject,
}

impl IncrementalFallback {
    pub fn as_str(self) -> &'static str {
        match self {
            IncrementalFallback::RunFull => "run_full",
            IncrementalFallback::Reject => "reject",
        }
    }
}

impl core::str::FromStr for IncrementalFallback {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "run_full" | "full" => Ok(IncrementalFallback::RunFull),
            "reject" | "error" => Ok(IncrementalFallback::Reject),
            other => Err(DomainError::validation(format!(
                "unknown incremental fallback '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncPolicy {
    pub incremental_fallback: IncrementalFallback,
    /// Upper bound on the discovery phase. `None` means unbounded.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub tenant_id: TenantId,
    pub adapter: AdapterType,
    pub mode: SyncMode,
}

/// Reasons a sync run was refused before it started, or aborted by storage.
///
/// Per-type discovery failures, timeouts and cancellation are not errors:
/// they are recorded on the returned [`SyncRun`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("adapter '{0}' does not support inventory sync")]
    Unsupported(AdapterType),

    #[error("incremental sync requested but no prior successful sync exists")]
    NoPriorSync,

    #[error("a sync is already running for tenant {0}")]
    AlreadyRunning(TenantId),

    #[error(transparent)]
    Store(#[from] InventoryStoreError),
}

enum PhaseOutcome {
    Finished(Result<(), InventoryStoreError>),
    TimedOut,
    Cancelled,
}

/// Runs inventory syncs, at most one per tenant at a time.
pub struct InventorySyncController {
    store: Arc<dyn InventoryStore>,
    policy: SyncPolicy,
    in_flight: Arc<Mutex<HashSet<TenantId>>>,
}

/// Releases the tenant's single-flight slot on drop.
struct InFlightGuard {
    tenant_id: TenantId,
    in_flight: Arc<Mutex<HashSet<TenantId>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.tenant_id);
        }
    }
}

impl InventorySyncController {
    pub fn new(store: Arc<dyn InventoryStore>, policy: SyncPolicy) -> Self {
        Self {
            store,
            policy,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    pub fn is_running(&self, tenant_id: TenantId) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(&tenant_id))
            .unwrap_or(false)
    }

    fn acquire(&self, tenant_id: TenantId) -> Result<InFlightGuard, SyncError> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| InventoryStoreError::Storage("sync guard poisoned".to_string()))?;
        if !set.insert(tenant_id) {
            return Err(SyncError::AlreadyRunning(tenant_id));
        }
        Ok(InFlightGuard {
            tenant_id,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Decide the executed mode and the incremental lower bound.
    async fn resolve_mode(
        &self,
        request: &SyncRequest,
    ) -> Result<(SyncMode, Option<DateTime<Utc>>), SyncError> {
        let capabilities = request.adapter.capabilities();
        if !capabilities.supports_inventory_sync {
            return Err(SyncError::Unsupported(request.adapter.clone()));
        }

        if request.mode == SyncMode::Full {
            return Ok((SyncMode::Full, None));
        }

        if !capabilities.supports_incremental_sync {
            warn!(
                tenant_id = %request.tenant_id,
                adapter = %request.adapter,
                "adapter has no incremental sync; running full sync"
            );
            return Ok((SyncMode::Full, None));
        }

        match self.store.last_successful_sync(request.tenant_id).await? {
            Some(since) => Ok((SyncMode::Incremental, Some(since))),
            None => match self.policy.incremental_fallback {
                IncrementalFallback::RunFull => {
                    warn!(
                        tenant_id = %request.tenant_id,
                        "no prior successful sync; downgrading incremental sync to full"
                    );
                    Ok((SyncMode::Full, None))
                }
                IncrementalFallback::Reject => Err(SyncError::NoPriorSync),
            },
        }
    }

    /// Execute one sync run.
    ///
    /// Cancellation and the timeout are honoured during discovery and checked
    /// once more before staleness marking; marking itself is never interrupted.
    #[instrument(
        skip(self, discovery, cancel),
        fields(tenant_id = %request.tenant_id, requested_mode = %request.mode),
        err
    )]
    pub async fn run(
        &self,
        request: SyncRequest,
        discovery: &dyn InventoryDiscovery,
        cancel: &CancellationToken,
    ) -> Result<SyncRun, SyncError> {
        let _guard = self.acquire(request.tenant_id)?;
        let (mode, since) = self.resolve_mode(&request).await?;

        let mut run = SyncRun::start(request.tenant_id, request.mode, mode, since);
        self.store.save_run(&run).await?;
        info!(run_id = %run.id, mode = %run.mode, "inventory sync started");

        let phase = discover_all(self.store.as_ref(), &mut run, discovery);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => PhaseOutcome::Cancelled,
            finished = with_timeout(self.policy.timeout, phase) => match finished {
                Some(result) => PhaseOutcome::Finished(result),
                None => PhaseOutcome::TimedOut,
            },
        };

        match outcome {
            PhaseOutcome::Finished(Ok(())) => {}
            PhaseOutcome::Finished(Err(e)) => {
                run.mark_failed(e.to_string());
                self.finish(&run).await?;
                return Err(e.into());
            }
            PhaseOutcome::TimedOut => {
                run.mark_failed("sync timed out during discovery");
                self.finish(&run).await?;
                return Ok(run);
            }
            PhaseOutcome::Cancelled => {
                run.mark_cancelled();
                self.finish(&run).await?;
                return Ok(run);
            }
        }

        if cancel.is_cancelled() {
            run.mark_cancelled();
            self.finish(&run).await?;
            return Ok(run);
        }

        let succeeded = run.succeeded_types();
        if succeeded.is_empty() {
            run.mark_failed("all item types failed");
            self.finish(&run).await?;
            return Ok(run);
        }

        let marked = match run.mode {
            SyncMode::Full => {
                match self
                    .store
                    .mark_stale(run.tenant_id, &succeeded, run.started_at)
                    .await
                {
                    Ok(marked) => marked,
                    Err(e) => {
                        run.mark_failed(e.to_string());
                        self.finish(&run).await?;
                        return Err(e.into());
                    }
                }
            }
            SyncMode::Incremental => 0,
        };

        run.mark_completed(marked);
        self.finish(&run).await?;
        Ok(run)
    }

    async fn finish(&self, run: &SyncRun) -> Result<(), InventoryStoreError> {
        self.store.save_run(run).await?;
        info!(
            run_id = %run.id,
            mode = %run.mode,
            status = run.status.as_str(),
            items_synced = run.items_synced(),
            items_marked_stale = run.items_marked_stale,
            "inventory sync finished"
        );
        Ok(())
    }
}

/// Discover every item type in order, isolating per-type failures.
async fn discover_all(
    store: &dyn InventoryStore,
    run: &mut SyncRun,
    discovery: &dyn InventoryDiscovery,
) -> Result<(), InventoryStoreError> {
    for item_type in InventoryItemType::ALL {
        match discovery.discover(run.tenant_id, item_type, run.since).await {
            Ok(items) => {
                let written = store.upsert_items(run.tenant_id, &items, run.started_at).await?;
                run.record_type_success(item_type, written);
            }
            Err(e) => {
                warn!(run_id = %run.id, item_type = %item_type, error = %e, "discovery failed");
                run.record_type_failure(item_type, e.to_string());
            }
        }
    }
    Ok(())
}

async fn with_timeout<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryError;
    use crate::item::{DiscoveredItem, InventoryItem};
    use crate::run::{SyncRunId, SyncRunStatus};
    use crate::store::InMemoryInventoryStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Delegates to the in-memory store and counts staleness passes.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryInventoryStore,
        mark_stale_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl InventoryStore for CountingStore {
        async fn upsert_items(
            &self,
            tenant_id: TenantId,
            items: &[DiscoveredItem],
            synced_at: DateTime<Utc>,
        ) -> Result<u64, InventoryStoreError> {
            self.inner.upsert_items(tenant_id, items, synced_at).await
        }

        async fn mark_stale(
            &self,
            tenant_id: TenantId,
            item_types: &[InventoryItemType],
            observed_before: DateTime<Utc>,
        ) -> Result<u64, InventoryStoreError> {
            self.mark_stale_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.mark_stale(tenant_id, item_types, observed_before).await
        }

        async fn last_successful_sync(
            &self,
            tenant_id: TenantId,
        ) -> Result<Option<DateTime<Utc>>, InventoryStoreError> {
            self.inner.last_successful_sync(tenant_id).await
        }

        async fn save_run(&self, run: &SyncRun) -> Result<(), InventoryStoreError> {
            self.inner.save_run(run).await
        }

        async fn get_run(
            &self,
            tenant_id: TenantId,
            run_id: SyncRunId,
        ) -> Result<Option<SyncRun>, InventoryStoreError> {
            self.inner.get_run(tenant_id, run_id).await
        }

        async fn list_items(
            &self,
            tenant_id: TenantId,
            item_type: Option<InventoryItemType>,
        ) -> Result<Vec<InventoryItem>, InventoryStoreError> {
            self.inner.list_items(tenant_id, item_type).await
        }
    }

    /// Serves fixed per-type results and records the `since` it was asked for.
    #[derive(Default)]
    struct FakeDiscovery {
        items: HashMap<InventoryItemType, Vec<DiscoveredItem>>,
        failing: Vec<InventoryItemType>,
        seen_since: Mutex<Vec<Option<DateTime<Utc>>>>,
    }

    impl FakeDiscovery {
        fn with_ad_units(ids: &[&str]) -> Self {
            let units = ids
                .iter()
                .map(|id| DiscoveredItem::new(InventoryItemType::AdUnit, *id, format!("Unit {id}")))
                .collect();
            Self {
                items: HashMap::from([(InventoryItemType::AdUnit, units)]),
                ..Self::default()
            }
        }

        fn failing(mut self, item_type: InventoryItemType) -> Self {
            self.failing.push(item_type);
            self
        }
    }

    #[async_trait::async_trait]
    impl InventoryDiscovery for FakeDiscovery {
        async fn discover(
            &self,
            _tenant_id: TenantId,
            item_type: InventoryItemType,
            since: Option<DateTime<Utc>>,
        ) -> Result<Vec<DiscoveredItem>, DiscoveryError> {
            self.seen_since.lock().unwrap().push(since);
            if self.failing.contains(&item_type) {
                return Err(DiscoveryError::Rpc(format!("{item_type} unavailable")));
            }
            Ok(self.items.get(&item_type).cloned().unwrap_or_default())
        }
    }

    fn controller(store: Arc<CountingStore>, fallback: IncrementalFallback) -> InventorySyncController {
        InventorySyncController::new(
            store,
            SyncPolicy {
                incremental_fallback: fallback,
                timeout: None,
            },
        )
    }

    fn request(tenant_id: TenantId, mode: SyncMode) -> SyncRequest {
        SyncRequest {
            tenant_id,
            adapter: AdapterType::GoogleAdManager,
            mode,
        }
    }

    #[tokio::test]
    async fn full_sync_marks_stale_exactly_once() {
        let store = Arc::new(CountingStore::default());
        let ctl = controller(store.clone(), IncrementalFallback::RunFull);
        let tenant = TenantId::new();

        let run = ctl
            .run(
                request(tenant, SyncMode::Full),
                &FakeDiscovery::with_ad_units(&["1", "2"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(run.status, SyncRunStatus::Completed);
        assert_eq!(store.mark_stale_calls.load(Ordering::SeqCst), 1);
        assert_eq!(run.items_synced(), 2);
    }

    #[tokio::test]
    async fn incremental_sync_never_marks_stale() {
        let store = Arc::new(CountingStore::default());
        let ctl = controller(store.clone(), IncrementalFallback::Reject);
        let tenant = TenantId::new();
        let cancel = CancellationToken::new();

        let first = ctl
            .run(request(tenant, SyncMode::Full), &FakeDiscovery::with_ad_units(&["1", "2"]), &cancel)
            .await
            .unwrap();
        store.mark_stale_calls.store(0, Ordering::SeqCst);

        let discovery = FakeDiscovery::with_ad_units(&["2"]);
        let run = ctl
            .run(request(tenant, SyncMode::Incremental), &discovery, &cancel)
            .await
            .unwrap();

        assert_eq!(run.mode, SyncMode::Incremental);
        assert_eq!(run.since, Some(first.started_at));
        assert_eq!(store.mark_stale_calls.load(Ordering::SeqCst), 0);
        assert!(
            discovery
                .seen_since
                .lock()
                .unwrap()
                .iter()
                .all(|s| *s == Some(first.started_at))
        );
        // Unit "1" was absent from the incremental result and stays active.
        let items = store.list_items(tenant, None).await.unwrap();
        assert!(items.iter().all(|i| !i.is_stale()));
    }

    #[tokio::test]
    async fn full_sync_marks_unobserved_items_stale() {
        let store = Arc::new(CountingStore::default());
        let ctl = controller(store.clone(), IncrementalFallback::RunFull);
        let tenant = TenantId::new();
        let cancel = CancellationToken::new();

        ctl.run(request(tenant, SyncMode::Full), &FakeDiscovery::with_ad_units(&["1", "2"]), &cancel)
            .await
            .unwrap();
        // Ensure the second run starts strictly later.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let run = ctl
            .run(request(tenant, SyncMode::Full), &FakeDiscovery::with_ad_units(&["2"]), &cancel)
            .await
            .unwrap();

        assert_eq!(run.items_marked_stale, 1);
        let stale: Vec<String> = store
            .list_items(tenant, None)
            .await
            .unwrap()
            .into_iter()
            .filter(|i| i.is_stale())
            .map(|i| i.external_id)
            .collect();
        assert_eq!(stale, vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn incremental_without_prior_sync_downgrades_by_default() {
        let store = Arc::new(CountingStore::default());
        let ctl = controller(store.clone(), IncrementalFallback::RunFull);

        let run = ctl
            .run(
                request(TenantId::new(), SyncMode::Incremental),
                &FakeDiscovery::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(run.requested_mode, SyncMode::Incremental);
        assert_eq!(run.mode, SyncMode::Full);
        assert!(run.is_downgraded());
        assert_eq!(store.mark_stale_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn incremental_without_prior_sync_can_be_rejected() {
        let store = Arc::new(CountingStore::default());
        let ctl = controller(store.clone(), IncrementalFallback::Reject);

        let err = ctl
            .run(
                request(TenantId::new(), SyncMode::Incremental),
                &FakeDiscovery::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::NoPriorSync));
        assert_eq!(store.mark_stale_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn adapter_without_sync_is_rejected() {
        let store = Arc::new(CountingStore::default());
        let ctl = controller(store, IncrementalFallback::RunFull);
        let req = SyncRequest {
            tenant_id: TenantId::new(),
            adapter: AdapterType::Triton,
            mode: SyncMode::Full,
        };

        let err = ctl
            .run(req, &FakeDiscovery::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Unsupported(AdapterType::Triton)));
    }

    #[tokio::test]
    async fn failed_type_is_excluded_from_staleness() {
        let store = Arc::new(CountingStore::default());
        let ctl = controller(store.clone(), IncrementalFallback::RunFull);
        let tenant = TenantId::new();
        let cancel = CancellationToken::new();

        store
            .upsert_items(
                tenant,
                &[DiscoveredItem::new(InventoryItemType::Placement, "p1", "Placement")],
                Utc::now() - chrono::Duration::hours(1),
            )
            .await
            .unwrap();

        let discovery =
            FakeDiscovery::with_ad_units(&["1"]).failing(InventoryItemType::Placement);
        let run = ctl.run(request(tenant, SyncMode::Full), &discovery, &cancel).await.unwrap();

        assert_eq!(run.status, SyncRunStatus::Completed);
        assert!(run.has_type_failures());
        assert!(!run.succeeded_types().contains(&InventoryItemType::Placement));
        let placements = store
            .list_items(tenant, Some(InventoryItemType::Placement))
            .await
            .unwrap();
        assert!(!placements[0].is_stale());
    }

    #[tokio::test]
    async fn all_types_failing_fails_the_run_without_marking() {
        let store = Arc::new(CountingStore::default());
        let ctl = controller(store.clone(), IncrementalFallback::RunFull);
        let discovery = InventoryItemType::ALL
            .into_iter()
            .fold(FakeDiscovery::default(), FakeDiscovery::failing);

        let run = ctl
            .run(
                request(TenantId::new(), SyncMode::Full),
                &discovery,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(matches!(run.status, SyncRunStatus::Failed { .. }));
        assert_eq!(store.mark_stale_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_run_never_marks() {
        let store = Arc::new(CountingStore::default());
        let ctl = controller(store.clone(), IncrementalFallback::RunFull);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let run = ctl
            .run(
                request(TenantId::new(), SyncMode::Full),
                &FakeDiscovery::with_ad_units(&["1"]),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(run.status, SyncRunStatus::Cancelled);
        assert_eq!(store.mark_stale_calls.load(Ordering::SeqCst), 0);
    }

    /// Blocks in discovery until released.
    struct GatedDiscovery {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl InventoryDiscovery for GatedDiscovery {
        async fn discover(
            &self,
            _tenant_id: TenantId,
            _item_type: InventoryItemType,
            _since: Option<DateTime<Utc>>,
        ) -> Result<Vec<DiscoveredItem>, DiscoveryError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn second_run_for_same_tenant_is_rejected_while_first_runs() {
        let store = Arc::new(CountingStore::default());
        let ctl = Arc::new(controller(store, IncrementalFallback::RunFull));
        let tenant = TenantId::new();
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let first = {
            let ctl = Arc::clone(&ctl);
            let discovery = GatedDiscovery {
                started: Arc::clone(&started),
                release: Arc::clone(&release),
            };
            let cancel = cancel.clone();
            tokio::spawn(async move {
                ctl.run(request(tenant, SyncMode::Full), &discovery, &cancel).await
            })
        };

        started.notified().await;
        assert!(ctl.is_running(tenant));
        let err = ctl
            .run(request(tenant, SyncMode::Full), &FakeDiscovery::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::AlreadyRunning(t) if t == tenant));

        // Other tenants are unaffected.
        ctl.run(request(TenantId::new(), SyncMode::Full), &FakeDiscovery::default(), &cancel)
            .await
            .unwrap();

        cancel.cancel();
        let run = first.await.unwrap().unwrap();
        assert_eq!(run.status, SyncRunStatus::Cancelled);
        assert!(!ctl.is_running(tenant));
    }

    #[tokio::test]
    async fn timeout_fails_the_run() {
        let store = Arc::new(CountingStore::default());
        let ctl = InventorySyncController::new(
            store.clone(),
            SyncPolicy {
                incremental_fallback: IncrementalFallback::RunFull,
                timeout: Some(Duration::from_millis(20)),
            },
        );
        let discovery = GatedDiscovery {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };

        let run = ctl
            .run(request(TenantId::new(), SyncMode::Full), &discovery, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(run.status, SyncRunStatus::Failed { .. }));
        assert_eq!(store.mark_stale_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fallback_parses_from_config_values() {
        assert_eq!("run_full".parse::<IncrementalFallback>().unwrap(), IncrementalFallback::RunFull);
        assert_eq!("REJECT".parse::<IncrementalFallback>().unwrap(), IncrementalFallback::Reject);
        assert!("sometimes".parse::<IncrementalFallback>().is_err());
    }
}
