//! Infrastructure layer: configuration, stores, tenant lookup, ad-server
//! wiring and the background inventory sync scheduler.

pub mod ad_server;
pub mod catalog;
pub mod config;
pub mod db;
pub mod media_buy_repo;
pub mod postgres_inventory;
pub mod scheduler;
pub mod stores;
pub mod tenant;

pub use ad_server::{AdServerError, AdServerRegistry, GamTarget};
pub use catalog::{CatalogError, InMemoryProductCatalog, PostgresProductCatalog, ProductCatalog};
pub use config::{AppConfig, ConfigWarning, SyncConfig};
pub use media_buy_repo::{InMemoryMediaBuyRepository, MediaBuyRepository, RepositoryError};
pub use postgres_inventory::PostgresInventoryStore;
pub use scheduler::{InventorySyncScheduler, SchedulerConfig, SchedulerHandle, SchedulerStats};
pub use stores::Stores;
pub use tenant::{InMemoryTenantResolver, TenantConfig, TenantError, TenantResolver};
