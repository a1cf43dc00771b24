//! Order construction: one order per media buy, one line item per package.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use salesagent_media_buy::MediaBuy;
use salesagent_products::{Product, ProductId};

use crate::error::GamError;
use crate::line_item::{CostType, Goal, LineItemType, select_line_item};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub name: String,
    pub advertiser_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_budget: Decimal,
    pub currency: String,
    /// Media buy id, kept on the order as an external reference.
    pub external_order_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemDraft {
    pub package_id: String,
    pub name: String,
    pub line_item_type: LineItemType,
    pub priority: u8,
    pub cost_type: CostType,
    pub cost_per_unit: Option<Decimal>,
    pub currency: String,
    pub goal: Option<Goal>,
    pub budget: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub targeted_ad_unit_ids: Vec<String>,
    pub creative_sizes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlan {
    pub order: OrderDraft,
    pub line_items: Vec<LineItemDraft>,
}

/// Build the order and its line items for an approved media buy.
///
/// `products` must contain every product the buy's packages reference.
pub fn build_order_plan<'p, I>(
    media_buy: &MediaBuy,
    products: I,
    advertiser_id: &str,
) -> Result<OrderPlan, GamError>
where
    I: IntoIterator<Item = &'p Product>,
{
    let packages_products = media_buy.packages_products()?;
    let by_id: HashMap<&ProductId, &Product> =
        products.into_iter().map(|p| (p.id_typed(), p)).collect();

    let start_time = media_buy.start_time().unwrap_or_else(Utc::now);
    let end_time = media_buy.end_time().unwrap_or(start_time);

    let mut line_items = Vec::with_capacity(media_buy.packages().len());
    let mut currency: Option<String> = None;

    for package in media_buy.packages() {
        let package_id = package.package_id.as_str();
        let entry = packages_products.get(&package.package_id).ok_or_else(|| {
            GamError::MissingPackageMetadata {
                package_id: package_id.to_string(),
            }
        })?;
        let pricing = by_id
            .get(&entry.product_id)
            .and_then(|p| p.pricing_option(&package.pricing_option_id))
            .ok_or_else(|| GamError::UnknownPricingOption {
                package_id: package_id.to_string(),
                pricing_option_id: package.pricing_option_id.clone(),
            })?;

        let selection = select_line_item(package, entry, pricing)?;
        if currency.is_none() {
            currency = Some(pricing.currency.clone());
        }

        let creative_sizes = if package.format_ids.is_empty() {
            by_id
                .get(&entry.product_id)
                .map(|p| p.format_ids().to_vec())
                .unwrap_or_default()
        } else {
            package.format_ids.clone()
        };

        line_items.push(LineItemDraft {
            package_id: package_id.to_string(),
            name: format!("{} - {}", media_buy.buyer_ref(), package_id),
            line_item_type: selection.line_item_type,
            priority: selection.priority,
            cost_type: selection.cost_type,
            cost_per_unit: selection.cost_per_unit,
            currency: pricing.currency.clone(),
            goal: selection.goal,
            budget: package.budget,
            start_time,
            end_time,
            targeted_ad_unit_ids: string_list(&entry.implementation_config, "targeted_ad_unit_ids"),
            creative_sizes,
        });
    }

    let name = if media_buy.buyer_ref().is_empty() {
        format!("AdCP order {}", media_buy.id_typed())
    } else {
        format!("{} ({})", media_buy.buyer_ref(), media_buy.id_typed())
    };

    Ok(OrderPlan {
        order: OrderDraft {
            name,
            advertiser_id: advertiser_id.to_string(),
            start_time,
            end_time,
            total_budget: media_buy.packages().iter().map(|p| p.budget).sum(),
            currency: currency.unwrap_or_else(|| "USD".to_string()),
            external_order_id: media_buy.id_typed().to_string(),
        },
        line_items,
    })
}

fn string_list(config: &JsonValue, key: &str) -> Vec<String> {
    config
        .get(key)
        .and_then(JsonValue::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
