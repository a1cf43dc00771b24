//! Postgres-backed inventory mirror.
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE inventory_items (
//!     tenant_id      UUID NOT NULL,
//!     item_type      TEXT NOT NULL,
//!     external_id    TEXT NOT NULL,
//!     name           TEXT NOT NULL,
//!     metadata       JSONB NOT NULL,
//!     status         TEXT NOT NULL,
//!     last_synced_at TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (tenant_id, item_type, external_id)
//! );
//!
//! CREATE TABLE inventory_sync_runs (
//!     run_id     UUID PRIMARY KEY,
//!     tenant_id  UUID NOT NULL,
//!     status     TEXT NOT NULL,
//!     clean      BOOLEAN NOT NULL,
//!     started_at TIMESTAMPTZ NOT NULL,
//!     run        JSONB NOT NULL
//! );
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use salesagent_core::TenantId;
use salesagent_inventory::{
    DiscoveredItem, InventoryItem, InventoryItemStatus, InventoryItemType, InventoryStore,
    InventoryStoreError, SyncRun, SyncRunId,
};

use crate::db::describe_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> InventoryStoreError {
    InventoryStoreError::Storage(describe_sqlx_error(operation, err))
}

#[derive(Debug)]
struct InventoryItemRow {
    tenant_id: Uuid,
    item_type: String,
    external_id: String,
    name: String,
    metadata: serde_json::Value,
    status: String,
    last_synced_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for InventoryItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(InventoryItemRow {
            tenant_id: row.try_get("tenant_id")?,
            item_type: row.try_get("item_type")?,
            external_id: row.try_get("external_id")?,
            name: row.try_get("name")?,
            metadata: row.try_get("metadata")?,
            status: row.try_get("status")?,
            last_synced_at: row.try_get("last_synced_at")?,
        })
    }
}

impl TryFrom<InventoryItemRow> for InventoryItem {
    type Error = InventoryStoreError;

    fn try_from(row: InventoryItemRow) -> Result<Self, Self::Error> {
        let item_type = row
            .item_type
            .parse::<InventoryItemType>()
            .map_err(|e| InventoryStoreError::Storage(e.to_string()))?;
        let status = match row.status.as_str() {
            "active" => InventoryItemStatus::Active,
            "stale" => InventoryItemStatus::Stale,
            other => {
                return Err(InventoryStoreError::Storage(format!(
                    "unknown inventory item status '{other}'"
                )));
            }
        };
        Ok(InventoryItem {
            tenant_id: TenantId::from_uuid(row.tenant_id),
            item_type,
            external_id: row.external_id,
            name: row.name,
            metadata: row.metadata,
            status,
            last_synced_at: row.last_synced_at,
        })
    }
}

#[async_trait::async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, items), fields(tenant_id = %tenant_id, item_count = items.len()), err)]
    async fn upsert_items(
        &self,
        tenant_id: TenantId,
        items: &[DiscoveredItem],
        synced_at: DateTime<Utc>,
    ) -> Result<u64, InventoryStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO inventory_items (
                    tenant_id, item_type, external_id, name, metadata, status, last_synced_at
                )
                VALUES ($1, $2, $3, $4, $5, 'active', $6)
                ON CONFLICT (tenant_id, item_type, external_id)
                DO UPDATE SET
                    name = EXCLUDED.name,
                    metadata = EXCLUDED.metadata,
                    status = 'active',
                    last_synced_at = EXCLUDED.last_synced_at
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(item.item_type.as_str())
            .bind(&item.external_id)
            .bind(&item.name)
            .bind(&item.metadata)
            .bind(synced_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(items.len() as u64)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn mark_stale(
        &self,
        tenant_id: TenantId,
        item_types: &[InventoryItemType],
        observed_before: DateTime<Utc>,
    ) -> Result<u64, InventoryStoreError> {
        if item_types.is_empty() {
            return Ok(0);
        }
        let types: Vec<&str> = item_types.iter().map(|t| t.as_str()).collect();

        // Single statement: either every matching row flips or none does.
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET status = 'stale'
            WHERE tenant_id = $1
              AND item_type = ANY($2)
              AND status = 'active'
              AND last_synced_at < $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&types)
        .bind(observed_before)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_stale", e))?;

        Ok(result.rows_affected())
    }

    async fn last_successful_sync(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<DateTime<Utc>>, InventoryStoreError> {
        sqlx::query_scalar(
            r#"
            SELECT MAX(started_at)
            FROM inventory_sync_runs
            WHERE tenant_id = $1 AND clean
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("last_successful_sync", e))
    }

    #[instrument(skip(self, run), fields(tenant_id = %run.tenant_id, run_id = %run.id), err)]
    async fn save_run(&self, run: &SyncRun) -> Result<(), InventoryStoreError> {
        let payload = serde_json::to_value(run)
            .map_err(|e| InventoryStoreError::Storage(format!("failed to encode run: {e}")))?;

        // The tenant guard in the conflict clause turns a cross-tenant
        // overwrite into zero affected rows.
        let result = sqlx::query(
            r#"
            INSERT INTO inventory_sync_runs (run_id, tenant_id, status, clean, started_at, run)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (run_id)
            DO UPDATE SET
                status = EXCLUDED.status,
                clean = EXCLUDED.clean,
                run = EXCLUDED.run
            WHERE inventory_sync_runs.tenant_id = EXCLUDED.tenant_id
            "#,
        )
        .bind(run.id.as_uuid())
        .bind(run.tenant_id.as_uuid())
        .bind(run.status.as_str())
        .bind(run.is_clean_success())
        .bind(run.started_at)
        .bind(&payload)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_run", e))?;

        if result.rows_affected() == 0 {
            return Err(InventoryStoreError::TenantIsolation);
        }
        Ok(())
    }

    async fn get_run(
        &self,
        tenant_id: TenantId,
        run_id: SyncRunId,
    ) -> Result<Option<SyncRun>, InventoryStoreError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, run
            FROM inventory_sync_runs
            WHERE run_id = $1
            "#,
        )
        .bind(run_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_run", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let owner: Uuid = row
            .try_get("tenant_id")
            .map_err(|e| map_sqlx_error("get_run", e))?;
        if owner != *tenant_id.as_uuid() {
            return Err(InventoryStoreError::TenantIsolation);
        }
        let payload: serde_json::Value = row
            .try_get("run")
            .map_err(|e| map_sqlx_error("get_run", e))?;
        serde_json::from_value(payload)
            .map(Some)
            .map_err(|e| InventoryStoreError::Storage(format!("failed to decode run: {e}")))
    }

    async fn list_items(
        &self,
        tenant_id: TenantId,
        item_type: Option<InventoryItemType>,
    ) -> Result<Vec<InventoryItem>, InventoryStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, item_type, external_id, name, metadata, status, last_synced_at
            FROM inventory_items
            WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR item_type = $2)
            ORDER BY item_type ASC, external_id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_type.map(|t| t.as_str()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let row = InventoryItemRow::from_row(&row)
                .map_err(|e| map_sqlx_error("list_items", e))?;
            items.push(row.try_into()?);
        }
        Ok(items)
    }
}
