//! Postgres-backed product catalog.
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE product_events (
//!     event_id        UUID PRIMARY KEY,
//!     tenant_id       UUID NOT NULL,
//!     product_id      TEXT NOT NULL,
//!     sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
//!     event_type      TEXT NOT NULL,
//!     event_version   INT NOT NULL,
//!     occurred_at     TIMESTAMPTZ NOT NULL,
//!     payload         JSONB NOT NULL,
//!     UNIQUE (tenant_id, product_id, sequence_number)
//! );
//! ```
//!
//! Reads run inside a `READ ONLY` transaction so discovery can never mutate
//! catalog state.

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use salesagent_core::TenantId;
use salesagent_events::EventRecord;
use salesagent_products::{Product, ProductEvent, ProductId};

use super::{CatalogError, ProductCatalog, ensure_stream};
use crate::db::{describe_sqlx_error, is_unique_violation};

#[derive(Debug, Clone)]
pub struct PostgresProductCatalog {
    pool: Arc<PgPool>,
}

impl PostgresProductCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn begin_read_only(&self) -> Result<Transaction<'static, Postgres>, CatalogError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_read_only", e))?;
        Ok(tx)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CatalogError {
    if is_unique_violation(&err) {
        CatalogError::Concurrency(describe_sqlx_error(operation, err))
    } else {
        CatalogError::Storage(describe_sqlx_error(operation, err))
    }
}

#[derive(Debug)]
struct ProductEventRow {
    product_id: String,
    payload: serde_json::Value,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for ProductEventRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductEventRow {
            product_id: row.try_get("product_id")?,
            payload: row.try_get("payload")?,
        })
    }
}

/// Group rows (already ordered by product id, sequence) into rebuilt products.
fn rebuild(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Product>, CatalogError> {
    let mut streams: BTreeMap<String, Vec<ProductEvent>> = BTreeMap::new();
    for row in rows {
        let row = ProductEventRow::from_row(&row)
            .map_err(|e| CatalogError::Storage(format!("failed to read event row: {e}")))?;
        let event: ProductEvent = serde_json::from_value(row.payload)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        streams.entry(row.product_id).or_default().push(event);
    }

    Ok(streams
        .into_iter()
        .map(|(id, events)| Product::from_events(ProductId::new(id), &events))
        .collect())
}

#[async_trait::async_trait]
impl ProductCatalog for PostgresProductCatalog {
    #[instrument(
        skip(self, events),
        fields(tenant_id = %tenant_id, product_id = %product_id, event_count = events.len()),
        err
    )]
    async fn append(
        &self,
        tenant_id: TenantId,
        product_id: &ProductId,
        expected_version: u64,
        events: &[ProductEvent],
    ) -> Result<(), CatalogError> {
        if events.is_empty() {
            return Ok(());
        }
        ensure_stream(tenant_id, product_id, events)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(sequence_number)
            FROM product_events
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("check_version", e))?;

        let current = current.unwrap_or(0) as u64;
        if current != expected_version {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(CatalogError::Concurrency(format!(
                "expected version {expected_version}, found {current}"
            )));
        }

        for (offset, event) in events.iter().enumerate() {
            let record = EventRecord::from_typed(tenant_id, product_id.as_str(), event)
                .map_err(|e| CatalogError::Serialization(e.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO product_events (
                    event_id, tenant_id, product_id, sequence_number,
                    event_type, event_version, occurred_at, payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(record.event_id)
            .bind(tenant_id.as_uuid())
            .bind(product_id.as_str())
            .bind((current + 1 + offset as u64) as i64)
            .bind(&record.event_type)
            .bind(record.event_version as i32)
            .bind(record.occurred_at)
            .bind(&record.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_event", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn load(
        &self,
        tenant_id: TenantId,
        product_id: &ProductId,
    ) -> Result<Option<Product>, CatalogError> {
        let mut tx = self.begin_read_only().await?;
        let rows = sqlx::query(
            r#"
            SELECT product_id, payload
            FROM product_events
            WHERE tenant_id = $1 AND product_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_product", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(rebuild(rows)?.into_iter().next())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Product>, CatalogError> {
        let mut tx = self.begin_read_only().await?;
        let rows = sqlx::query(
            r#"
            SELECT product_id, payload
            FROM product_events
            WHERE tenant_id = $1
            ORDER BY product_id ASC, sequence_number ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        rebuild(rows)
    }
}
