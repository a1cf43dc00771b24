//! Sync run records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use salesagent_core::TenantId;

use crate::item::InventoryItemType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SyncRunStatus {
    Running,
    Completed,
    Failed { error: String },
    Cancelled,
}

impl SyncRunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncRunStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRunStatus::Running => "running",
            SyncRunStatus::Completed => "completed",
            SyncRunStatus::Failed { .. } => "failed",
            SyncRunStatus::Cancelled => "cancelled",
        }
    }
}

/// Result of discovering one item type within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSyncOutcome {
    pub item_type: InventoryItemType,
    pub items_synced: u64,
    pub error: Option<String>,
}

impl TypeSyncOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// One execution of the inventory sync for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub tenant_id: TenantId,
    /// Mode the caller asked for.
    pub requested_mode: SyncMode,
    /// Mode actually executed. Differs from `requested_mode` on downgrade.
    pub mode: SyncMode,
    /// Lower bound for incremental fetches.
    pub since: Option<DateTime<Utc>>,
    pub status: SyncRunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub types: Vec<TypeSyncOutcome>,
    pub items_marked_stale: u64,
}

impl SyncRun {
    /// Start a run. The run is `Running` from construction.
    pub fn start(
        tenant_id: TenantId,
        requested_mode: SyncMode,
        mode: SyncMode,
        since: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: SyncRunId::new(),
            tenant_id,
            requested_mode,
            mode,
            since,
            status: SyncRunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            types: Vec::new(),
            items_marked_stale: 0,
        }
    }

    pub fn is_downgraded(&self) -> bool {
        self.requested_mode != self.mode
    }

    pub fn record_type_success(&mut self, item_type: InventoryItemType, items_synced: u64) {
        self.types.push(TypeSyncOutcome {
            item_type,
            items_synced,
            error: None,
        });
    }

    pub fn record_type_failure(&mut self, item_type: InventoryItemType, error: String) {
        self.types.push(TypeSyncOutcome {
            item_type,
            items_synced: 0,
            error: Some(error),
        });
    }

    /// Types whose discovery completed; only these take part in staleness marking.
    pub fn succeeded_types(&self) -> Vec<InventoryItemType> {
        self.types
            .iter()
            .filter(|t| t.succeeded())
            .map(|t| t.item_type)
            .collect()
    }

    pub fn has_type_failures(&self) -> bool {
        self.types.iter().any(|t| !t.succeeded())
    }

    pub fn items_synced(&self) -> u64 {
        self.types.iter().map(|t| t.items_synced).sum()
    }

    /// A completed run with no failed types. Only these anchor later
    /// incremental runs.
    pub fn is_clean_success(&self) -> bool {
        self.status == SyncRunStatus::Completed && !self.has_type_failures()
    }

    pub fn mark_completed(&mut self, items_marked_stale: u64) {
        self.status = SyncRunStatus::Completed;
        self.items_marked_stale = items_marked_stale;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SyncRunStatus::Failed {
            error: error.into(),
        };
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = SyncRunStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}
