//! Ad-server inventory mirror and the sync controller that keeps it current.
//!
//! A full sync observes every item of every type and may therefore mark the
//! items it did not see as stale. An incremental sync only sees what changed
//! since the last successful run and never touches staleness.

pub mod controller;
pub mod discovery;
pub mod item;
pub mod run;
pub mod store;

pub use controller::{IncrementalFallback, InventorySyncController, SyncError, SyncPolicy, SyncRequest};
pub use discovery::{DiscoveryError, InventoryDiscovery};
pub use item::{DiscoveredItem, InventoryItem, InventoryItemStatus, InventoryItemType};
pub use run::{SyncMode, SyncRun, SyncRunId, SyncRunStatus, TypeSyncOutcome};
pub use store::{InMemoryInventoryStore, InventoryStore, InventoryStoreError};
