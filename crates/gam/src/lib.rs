//! Google Ad Manager adapter: line-item selection, order construction and
//! inventory discovery over an opaque [`GamClient`].

pub mod client;
pub mod discovery;
pub mod error;
pub mod line_item;
pub mod order;

pub use client::{CreatedOrder, GamClient, RecordingGamClient, submit_order_plan};
pub use discovery::{GamInventoryDiscovery, PqlStatement};
pub use error::GamError;
pub use line_item::{
    CostType, Goal, GoalType, LineItemSelection, LineItemType, UnitType, select_line_item,
};
pub use order::{LineItemDraft, OrderDraft, OrderPlan, build_order_plan};
