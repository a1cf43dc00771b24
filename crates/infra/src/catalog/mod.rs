//! Product catalog storage.
//!
//! Products are stored as their event history and rebuilt on read with
//! [`Product::from_events`]. Reads never write.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryProductCatalog;
pub use postgres::PostgresProductCatalog;

use std::sync::Arc;

use salesagent_core::TenantId;
use salesagent_products::{Product, ProductEvent, ProductId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("catalog storage error: {0}")]
    Storage(String),
}

#[async_trait::async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Append events to a product stream. `expected_version` is the number of
    /// events the caller rebuilt the product from.
    async fn append(
        &self,
        tenant_id: TenantId,
        product_id: &ProductId,
        expected_version: u64,
        events: &[ProductEvent],
    ) -> Result<(), CatalogError>;

    async fn load(
        &self,
        tenant_id: TenantId,
        product_id: &ProductId,
    ) -> Result<Option<Product>, CatalogError>;

    /// Every product of the tenant (archived and expired included), ordered by id.
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Product>, CatalogError>;
}

#[async_trait::async_trait]
impl<S> ProductCatalog for Arc<S>
where
    S: ProductCatalog + ?Sized,
{
    async fn append(
        &self,
        tenant_id: TenantId,
        product_id: &ProductId,
        expected_version: u64,
        events: &[ProductEvent],
    ) -> Result<(), CatalogError> {
        (**self).append(tenant_id, product_id, expected_version, events).await
    }

    async fn load(
        &self,
        tenant_id: TenantId,
        product_id: &ProductId,
    ) -> Result<Option<Product>, CatalogError> {
        (**self).load(tenant_id, product_id).await
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Product>, CatalogError> {
        (**self).list(tenant_id).await
    }
}

/// Events must belong to the stream they are appended to.
fn ensure_stream(
    tenant_id: TenantId,
    product_id: &ProductId,
    events: &[ProductEvent],
) -> Result<(), CatalogError> {
    for (idx, event) in events.iter().enumerate() {
        let (event_tenant, event_product) = match event {
            ProductEvent::ProductPublished(e) => (e.tenant_id, &e.product_id),
            ProductEvent::ProductArchived(e) => (e.tenant_id, &e.product_id),
            ProductEvent::ProductExpiryChanged(e) => (e.tenant_id, &e.product_id),
        };
        if event_tenant != tenant_id {
            return Err(CatalogError::TenantIsolation(format!(
                "event {idx} belongs to tenant {event_tenant}"
            )));
        }
        if event_product != product_id {
            return Err(CatalogError::Concurrency(format!(
                "event {idx} belongs to product {event_product}"
            )));
        }
    }
    Ok(())
}
