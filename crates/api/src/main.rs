//! Background worker: runs the scheduled inventory sync for every configured
//! tenant until interrupted.

use std::sync::Arc;

use salesagent_api::SalesAgent;
use salesagent_infra::{
    AdServerRegistry, AppConfig, InMemoryTenantResolver, SchedulerConfig, Stores,
};
use salesagent_inventory::SyncMode;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();
    salesagent_observability::init(config.log_format);
    config.log_warnings();

    let tenants = match &config.tenants_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path).expect("failed to read tenants file");
            InMemoryTenantResolver::from_json(&raw).expect("invalid tenants file")
        }
        None => {
            tracing::warn!("SALESAGENT_TENANTS_FILE not set; no tenants will be synced");
            InMemoryTenantResolver::new()
        }
    };

    let stores = Stores::from_config(&config)
        .await
        .expect("failed to initialize stores");

    // The GAM transport is provided by the deployment; this binary only
    // carries the in-process client and says so at startup.
    let agent = SalesAgent::new(
        Arc::new(tenants),
        stores,
        AdServerRegistry::in_process(),
        config.sync.policy(),
    );

    let scheduler = Arc::new(agent.scheduler(SchedulerConfig {
        interval: config.sync.interval,
        mode: SyncMode::Incremental,
    }));
    let handle = scheduler.start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
    handle.shutdown().await;
}
