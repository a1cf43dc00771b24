//! Ad-server RPC boundary.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use salesagent_inventory::{DiscoveredItem, InventoryItemType};

use crate::discovery::PqlStatement;
use crate::error::GamError;
use crate::order::{LineItemDraft, OrderDraft, OrderPlan};

/// Opaque Google Ad Manager client. Implementations own transport and auth.
#[async_trait::async_trait]
pub trait GamClient: Send + Sync {
    /// Create an order and return its ad-server id.
    async fn create_order(&self, network_code: &str, order: &OrderDraft) -> Result<String, GamError>;

    /// Create line items under an existing order, returning their ids in input order.
    async fn create_line_items(
        &self,
        network_code: &str,
        order_id: &str,
        line_items: &[LineItemDraft],
    ) -> Result<Vec<String>, GamError>;

    /// Fetch inventory of one type matching `statement`.
    async fn fetch_inventory(
        &self,
        network_code: &str,
        item_type: InventoryItemType,
        statement: &PqlStatement,
    ) -> Result<Vec<DiscoveredItem>, GamError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub order_id: String,
    pub line_item_ids: Vec<String>,
}

/// Create the order, then its line items.
#[instrument(
    skip(client, plan),
    fields(order_name = %plan.order.name, line_items = plan.line_items.len()),
    err
)]
pub async fn submit_order_plan(
    client: &dyn GamClient,
    network_code: &str,
    plan: &OrderPlan,
) -> Result<CreatedOrder, GamError> {
    let order_id = client.create_order(network_code, &plan.order).await?;
    let line_item_ids = client
        .create_line_items(network_code, &order_id, &plan.line_items)
        .await?;

    if line_item_ids.len() != plan.line_items.len() {
        return Err(GamError::Rpc(format!(
            "expected {} line item ids, got {}",
            plan.line_items.len(),
            line_item_ids.len()
        )));
    }

    info!(%order_id, "ad server order created");
    Ok(CreatedOrder {
        order_id,
        line_item_ids,
    })
}

/// In-process client for development and tests: records writes and serves
/// canned inventory.
#[derive(Debug, Default)]
pub struct RecordingGamClient {
    next_id: AtomicU64,
    orders: Mutex<Vec<OrderDraft>>,
    line_items: Mutex<Vec<(String, LineItemDraft)>>,
    statements: Mutex<Vec<(InventoryItemType, String)>>,
    inventory: HashMap<InventoryItemType, Vec<DiscoveredItem>>,
    failing_types: Vec<InventoryItemType>,
    fail_orders: AtomicBool,
}

fn poisoned<T>(_: T) -> GamError {
    GamError::Rpc("client state poisoned".to_string())
}

impl RecordingGamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inventory(mut self, items: Vec<DiscoveredItem>) -> Self {
        for item in items {
            self.inventory.entry(item.item_type).or_default().push(item);
        }
        self
    }

    pub fn failing_on(mut self, item_type: InventoryItemType) -> Self {
        self.failing_types.push(item_type);
        self
    }

    /// Make `create_order` fail until switched back.
    pub fn set_failing_orders(&self, failing: bool) {
        self.fail_orders.store(failing, Ordering::Relaxed);
    }

    pub fn orders(&self) -> Vec<OrderDraft> {
        self.orders.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Line items with the order id they were created under.
    pub fn line_items(&self) -> Vec<(String, LineItemDraft)> {
        self.line_items.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// PQL statements received, by item type.
    pub fn statements(&self) -> Vec<(InventoryItemType, String)> {
        self.statements.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{n}")
    }
}

#[async_trait::async_trait]
impl GamClient for RecordingGamClient {
    async fn create_order(&self, _network_code: &str, order: &OrderDraft) -> Result<String, GamError> {
        if self.fail_orders.load(Ordering::Relaxed) {
            return Err(GamError::Rpc("order service unavailable".to_string()));
        }
        let id = self.next_id("order");
        self.orders.lock().map_err(poisoned)?.push(order.clone());
        Ok(id)
    }

    async fn create_line_items(
        &self,
        _network_code: &str,
        order_id: &str,
        line_items: &[LineItemDraft],
    ) -> Result<Vec<String>, GamError> {
        let mut stored = self.line_items.lock().map_err(poisoned)?;
        let mut ids = Vec::with_capacity(line_items.len());
        for item in line_items {
            ids.push(self.next_id("line-item"));
            stored.push((order_id.to_string(), item.clone()));
        }
        Ok(ids)
    }

    async fn fetch_inventory(
        &self,
        _network_code: &str,
        item_type: InventoryItemType,
        statement: &PqlStatement,
    ) -> Result<Vec<DiscoveredItem>, GamError> {
        self.statements
            .lock()
            .map_err(poisoned)?
            .push((item_type, statement.as_str().to_string()));
        if self.failing_types.contains(&item_type) {
            return Err(GamError::Rpc(format!("{item_type} service unavailable")));
        }
        Ok(self.inventory.get(&item_type).cloned().unwrap_or_default())
    }
}
