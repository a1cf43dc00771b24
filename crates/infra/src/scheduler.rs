//! Periodic inventory sync across all tenants.
//!
//! Each tick starts one sync per sync-capable tenant. A tenant whose previous
//! run is still going is skipped by the controller's single-flight guard, so a
//! slow tenant never stacks runs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use salesagent_core::TenantId;
use salesagent_inventory::{
    InventorySyncController, SyncError, SyncMode, SyncRequest, SyncRun, SyncRunStatus,
};

use crate::ad_server::{AdServerError, AdServerRegistry};
use crate::tenant::TenantResolver;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Mode requested on every tick. Tenants without a prior successful
    /// sync are handled by the controller's incremental fallback.
    pub mode: SyncMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            mode: SyncMode::Incremental,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub runs_cancelled: u64,
    pub skipped_in_flight: u64,
}

pub type TickOutcome = Vec<(TenantId, Result<SyncRun, SyncError>)>;

pub struct InventorySyncScheduler {
    controller: Arc<InventorySyncController>,
    tenants: Arc<dyn TenantResolver>,
    ad_servers: AdServerRegistry,
    config: SchedulerConfig,
    stats: Mutex<SchedulerStats>,
}

impl InventorySyncScheduler {
    pub fn new(
        controller: Arc<InventorySyncController>,
        tenants: Arc<dyn TenantResolver>,
        ad_servers: AdServerRegistry,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            controller,
            tenants,
            ad_servers,
            config,
            stats: Mutex::new(SchedulerStats::default()),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Run one sync per eligible tenant concurrently and wait for all of them.
    pub async fn tick(&self, cancel: &CancellationToken) -> TickOutcome {
        let tenants = match self.tenants.list_tenants().await {
            Ok(tenants) => tenants,
            Err(e) => {
                error!(error = %e, "failed to list tenants for inventory sync");
                return Vec::new();
            }
        };

        let mut tasks = JoinSet::new();
        for tenant in tenants {
            let discovery = match self.ad_servers.discovery_for(&tenant) {
                Ok(discovery) => discovery,
                Err(AdServerError::Unsupported(_)) => continue,
                Err(e) => {
                    warn!(tenant_id = %tenant.tenant_id, error = %e, "skipping inventory sync");
                    continue;
                }
            };

            let controller = Arc::clone(&self.controller);
            let cancel = cancel.clone();
            let request = SyncRequest {
                tenant_id: tenant.tenant_id,
                adapter: tenant.adapter.clone(),
                mode: self.config.mode,
            };
            tasks.spawn(async move {
                let tenant_id = request.tenant_id;
                let result = controller.run(request, discovery.as_ref(), &cancel).await;
                (tenant_id, result)
            });
        }

        let mut outcome = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => outcome.push(entry),
                Err(e) => error!(error = %e, "inventory sync task panicked"),
            }
        }
        outcome.sort_by_key(|(tenant_id, _)| *tenant_id);
        self.record(&outcome);
        outcome
    }

    fn record(&self, outcome: &TickOutcome) {
        let Ok(mut stats) = self.stats.lock() else {
            return;
        };
        stats.ticks += 1;
        for (tenant_id, result) in outcome {
            match result {
                Ok(run) => match &run.status {
                    SyncRunStatus::Completed => stats.runs_completed += 1,
                    SyncRunStatus::Cancelled => stats.runs_cancelled += 1,
                    SyncRunStatus::Failed { .. } | SyncRunStatus::Running => {
                        stats.runs_failed += 1
                    }
                },
                Err(SyncError::AlreadyRunning(_)) => {
                    debug!(%tenant_id, "previous sync still running");
                    stats.skipped_in_flight += 1;
                }
                Err(e) => {
                    warn!(%tenant_id, error = %e, "inventory sync refused");
                    stats.runs_failed += 1;
                }
            }
        }
    }

    /// Tick every `interval` until the returned handle is shut down. The
    /// first tick fires immediately.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let interval = self.config.interval;

        let join = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "inventory sync scheduler started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        self.tick(&token).await;
                    }
                }
            }
            info!("inventory sync scheduler stopped");
        });

        SchedulerHandle { cancel, join }
    }
}

#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Cancel in-flight runs (recorded as cancelled) and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!(error = %e, "inventory sync scheduler task failed");
        }
    }
}
