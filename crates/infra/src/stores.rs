use std::sync::Arc;

use tracing::info;

use salesagent_inventory::{InMemoryInventoryStore, InventoryStore};

use crate::catalog::{InMemoryProductCatalog, PostgresProductCatalog, ProductCatalog};
use crate::config::AppConfig;
use crate::db;
use crate::media_buy_repo::{InMemoryMediaBuyRepository, MediaBuyRepository};
use crate::postgres_inventory::PostgresInventoryStore;

/// The set of stores a process runs against.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn ProductCatalog>,
    pub inventory: Arc<dyn InventoryStore>,
    pub media_buys: Arc<dyn MediaBuyRepository>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            catalog: InMemoryProductCatalog::arc(),
            inventory: InMemoryInventoryStore::arc(),
            media_buys: InMemoryMediaBuyRepository::arc(),
        }
    }

    /// Postgres-backed catalog and inventory when `DATABASE_URL` is set,
    /// in-memory otherwise. Media buys are kept in memory either way.
    pub async fn from_config(config: &AppConfig) -> Result<Self, sqlx::Error> {
        let Some(url) = config.database_url.as_deref() else {
            info!("no database configured; using in-memory stores");
            return Ok(Self::in_memory());
        };

        let pool = db::connect(url).await?;
        info!("connected to postgres");
        Ok(Self {
            catalog: Arc::new(PostgresProductCatalog::new(pool.clone())),
            inventory: Arc::new(PostgresInventoryStore::new(pool)),
            media_buys: InMemoryMediaBuyRepository::arc(),
        })
    }
}
