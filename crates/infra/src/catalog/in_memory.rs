use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use salesagent_core::TenantId;
use salesagent_products::{Product, ProductEvent, ProductId};

use super::{CatalogError, ProductCatalog, ensure_stream};

type StreamKey = (TenantId, ProductId);

/// In-memory product catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    streams: RwLock<HashMap<StreamKey, Vec<ProductEvent>>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned<T>(_: T) -> CatalogError {
    CatalogError::Storage("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn append(
        &self,
        tenant_id: TenantId,
        product_id: &ProductId,
        expected_version: u64,
        events: &[ProductEvent],
    ) -> Result<(), CatalogError> {
        ensure_stream(tenant_id, product_id, events)?;

        let mut streams = self.streams.write().map_err(poisoned)?;
        let stream = streams.entry((tenant_id, product_id.clone())).or_default();
        if stream.len() as u64 != expected_version {
            return Err(CatalogError::Concurrency(format!(
                "expected version {expected_version}, found {}",
                stream.len()
            )));
        }
        stream.extend_from_slice(events);
        Ok(())
    }

    async fn load(
        &self,
        tenant_id: TenantId,
        product_id: &ProductId,
    ) -> Result<Option<Product>, CatalogError> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams
            .get(&(tenant_id, product_id.clone()))
            .filter(|events| !events.is_empty())
            .map(|events| Product::from_events(product_id.clone(), events)))
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Product>, CatalogError> {
        let streams = self.streams.read().map_err(poisoned)?;
        let mut products: Vec<Product> = streams
            .iter()
            .filter(|((tenant, _), events)| *tenant == tenant_id && !events.is_empty())
            .map(|((_, product_id), events)| Product::from_events(product_id.clone(), events))
            .collect();
        products.sort_by(|a, b| a.id_typed().cmp(b.id_typed()));
        Ok(products)
    }
}
