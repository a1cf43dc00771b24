//! Line-item type, priority, cost type and goal selection.
//!
//! Selection branches first on the package's delivery type. A type named in
//! the product's `implementation_config.line_item_type` is honoured only when
//! it belongs to that delivery class.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use salesagent_media_buy::{PackageProductEntry, PackageRequest};
use salesagent_products::{PricingModel, PricingOption};

use crate::error::GamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineItemType {
    Sponsorship,
    Standard,
    Network,
    Bulk,
    PricePriority,
    House,
}

impl LineItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            LineItemType::Sponsorship => "SPONSORSHIP",
            LineItemType::Standard => "STANDARD",
            LineItemType::Network => "NETWORK",
            LineItemType::Bulk => "BULK",
            LineItemType::PricePriority => "PRICE_PRIORITY",
            LineItemType::House => "HOUSE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SPONSORSHIP" => Some(LineItemType::Sponsorship),
            "STANDARD" => Some(LineItemType::Standard),
            "NETWORK" => Some(LineItemType::Network),
            "BULK" => Some(LineItemType::Bulk),
            "PRICE_PRIORITY" => Some(LineItemType::PricePriority),
            "HOUSE" => Some(LineItemType::House),
            _ => None,
        }
    }

    /// Reserves inventory (guaranteed delivery).
    pub fn is_guaranteed(self) -> bool {
        matches!(self, LineItemType::Sponsorship | LineItemType::Standard)
    }

    pub fn default_priority(self) -> u8 {
        match self {
            LineItemType::Sponsorship => 4,
            LineItemType::Standard => 8,
            LineItemType::Network | LineItemType::Bulk | LineItemType::PricePriority => 12,
            LineItemType::House => 16,
        }
    }
}

impl core::fmt::Display for LineItemType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostType {
    Cpm,
    Vcpm,
    Cpc,
    Cpd,
}

impl CostType {
    pub fn for_pricing_model(model: PricingModel) -> Option<Self> {
        match model {
            PricingModel::Cpm => Some(CostType::Cpm),
            PricingModel::Vcpm => Some(CostType::Vcpm),
            PricingModel::Cpc => Some(CostType::Cpc),
            PricingModel::FlatRate => Some(CostType::Cpd),
            PricingModel::Cpcv | PricingModel::Cpv | PricingModel::Cpp => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalType {
    Lifetime,
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitType {
    Impressions,
}

/// Delivery goal. For daily sponsorship goals `units` is a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub goal_type: GoalType,
    pub unit_type: UnitType,
    pub units: u64,
}

impl Goal {
    pub fn lifetime_impressions(units: u64) -> Self {
        Self {
            goal_type: GoalType::Lifetime,
            unit_type: UnitType::Impressions,
            units,
        }
    }

    pub fn daily_share(percent: u64) -> Self {
        Self {
            goal_type: GoalType::Daily,
            unit_type: UnitType::Impressions,
            units: percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemSelection {
    pub line_item_type: LineItemType,
    pub priority: u8,
    pub cost_type: CostType,
    pub cost_per_unit: Option<Decimal>,
    pub goal: Option<Goal>,
}

/// Pick the line-item settings for one package.
pub fn select_line_item(
    package: &PackageRequest,
    entry: &PackageProductEntry,
    pricing: &PricingOption,
) -> Result<LineItemSelection, GamError> {
    let package_id = package.package_id.as_str();
    let guaranteed = entry.is_guaranteed();

    let configured = configured_line_item_type(package_id, &entry.implementation_config)?;
    let line_item_type = match configured {
        Some(t) if t.is_guaranteed() == guaranteed => t,
        Some(t) => {
            return Err(GamError::IncompatibleLineItemType {
                package_id: package_id.to_string(),
                line_item_type: t,
                guaranteed,
            });
        }
        None if guaranteed && pricing.pricing_model == PricingModel::FlatRate => {
            LineItemType::Sponsorship
        }
        None if guaranteed => LineItemType::Standard,
        None => LineItemType::PricePriority,
    };

    let cost_type = CostType::for_pricing_model(pricing.pricing_model).ok_or_else(|| {
        GamError::UnsupportedPricingModel {
            package_id: package_id.to_string(),
            model: pricing.pricing_model,
        }
    })?;

    let priority = configured_priority(package_id, &entry.implementation_config)
        .unwrap_or_else(|| line_item_type.default_priority());

    let goal = match line_item_type {
        LineItemType::Sponsorship => Some(Goal::daily_share(100)),
        LineItemType::Standard | LineItemType::Bulk => Some(Goal::lifetime_impressions(
            impression_goal(package, pricing)?,
        )),
        LineItemType::Network | LineItemType::PricePriority | LineItemType::House => None,
    };

    Ok(LineItemSelection {
        line_item_type,
        priority,
        cost_type,
        cost_per_unit: pricing.fixed_price().or_else(|| pricing.floor_price()),
        goal,
    })
}

fn configured_line_item_type(
    package_id: &str,
    config: &JsonValue,
) -> Result<Option<LineItemType>, GamError> {
    match config.get("line_item_type") {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(raw)) => LineItemType::parse(raw).map(Some).ok_or_else(|| {
            GamError::UnknownLineItemType {
                package_id: package_id.to_string(),
                value: raw.clone(),
            }
        }),
        Some(other) => Err(GamError::UnknownLineItemType {
            package_id: package_id.to_string(),
            value: other.to_string(),
        }),
    }
}

fn configured_priority(package_id: &str, config: &JsonValue) -> Option<u8> {
    let raw = config.get("priority")?;
    match raw.as_u64() {
        Some(p @ 1..=16) => Some(p as u8),
        _ => {
            warn!(package_id, priority = %raw, "ignoring out-of-range line item priority");
            None
        }
    }
}

/// Package impressions, or budget / CPM price when only a budget was given.
fn impression_goal(package: &PackageRequest, pricing: &PricingOption) -> Result<u64, GamError> {
    if let Some(impressions) = package.impressions {
        return Ok(impressions);
    }

    let price = pricing.fixed_price().or_else(|| pricing.floor_price());
    let derived = match (pricing.pricing_model, price) {
        (PricingModel::Cpm | PricingModel::Vcpm, Some(price)) if price > Decimal::ZERO => {
            package
                .budget
                .checked_div(price)
                .and_then(|units| units.checked_mul(Decimal::ONE_THOUSAND))
                .and_then(|impressions| impressions.floor().to_u64())
        }
        _ => None,
    };

    derived
        .filter(|units| *units > 0)
        .ok_or_else(|| GamError::MissingImpressionGoal {
            package_id: package.package_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesagent_media_buy::PackageId;
    use salesagent_products::{DeliveryType, ProductId};
    use serde_json::json;

    fn package(impressions: Option<u64>) -> PackageRequest {
        PackageRequest {
            package_id: PackageId::new("pkg_1"),
            product_id: ProductId::new("prod_1"),
            pricing_option_id: "opt".to_string(),
            budget: Decimal::new(5000, 0),
            impressions,
            format_ids: Vec::new(),
        }
    }

    fn entry(delivery_type: DeliveryType, config: JsonValue) -> PackageProductEntry {
        PackageProductEntry {
            product_id: ProductId::new("prod_1"),
            implementation_config: config,
            delivery_type,
        }
    }

    fn cpm_fixed() -> PricingOption {
        PricingOption::fixed("opt", PricingModel::Cpm, Decimal::new(10, 0), "USD")
    }

    fn cpm_auction() -> PricingOption {
        PricingOption::auction("opt", PricingModel::Cpm, Some(Decimal::new(2, 0)), "USD")
    }

    #[test]
    fn guaranteed_cpm_defaults_to_standard_with_lifetime_goal() {
        let sel = select_line_item(
            &package(Some(250_000)),
            &entry(DeliveryType::Guaranteed, json!({})),
            &cpm_fixed(),
        )
        .unwrap();
        assert_eq!(sel.line_item_type, LineItemType::Standard);
        assert_eq!(sel.priority, 8);
        assert_eq!(sel.cost_type, CostType::Cpm);
        assert_eq!(sel.goal, Some(Goal::lifetime_impressions(250_000)));
        assert_eq!(sel.cost_per_unit, Some(Decimal::new(10, 0)));
    }

    #[test]
    fn guaranteed_flat_rate_defaults_to_sponsorship() {
        let flat = PricingOption::fixed("opt", PricingModel::FlatRate, Decimal::new(2000, 0), "USD");
        let sel = select_line_item(
            &package(None),
            &entry(DeliveryType::Guaranteed, json!({})),
            &flat,
        )
        .unwrap();
        assert_eq!(sel.line_item_type, LineItemType::Sponsorship);
        assert_eq!(sel.priority, 4);
        assert_eq!(sel.cost_type, CostType::Cpd);
        assert_eq!(sel.goal, Some(Goal::daily_share(100)));
    }

    #[test]
    fn non_guaranteed_defaults_to_price_priority_without_goal() {
        let sel = select_line_item(
            &package(None),
            &entry(DeliveryType::NonGuaranteed, json!({})),
            &cpm_auction(),
        )
        .unwrap();
        assert_eq!(sel.line_item_type, LineItemType::PricePriority);
        assert_eq!(sel.priority, 12);
        assert_eq!(sel.goal, None);
        assert_eq!(sel.cost_per_unit, Some(Decimal::new(2, 0)));
    }

    #[test]
    fn configured_type_of_matching_class_is_used() {
        let sel = select_line_item(
            &package(None),
            &entry(DeliveryType::NonGuaranteed, json!({ "line_item_type": "house" })),
            &cpm_auction(),
        )
        .unwrap();
        assert_eq!(sel.line_item_type, LineItemType::House);
        assert_eq!(sel.priority, 16);
    }

    #[test]
    fn configured_type_of_wrong_class_is_rejected() {
        let err = select_line_item(
            &package(Some(1000)),
            &entry(DeliveryType::Guaranteed, json!({ "line_item_type": "PRICE_PRIORITY" })),
            &cpm_fixed(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GamError::IncompatibleLineItemType {
                package_id: "pkg_1".to_string(),
                line_item_type: LineItemType::PricePriority,
                guaranteed: true,
            }
        );

        let err = select_line_item(
            &package(None),
            &entry(DeliveryType::NonGuaranteed, json!({ "line_item_type": "SPONSORSHIP" })),
            &cpm_auction(),
        )
        .unwrap_err();
        assert!(matches!(err, GamError::IncompatibleLineItemType { guaranteed: false, .. }));
    }

    #[test]
    fn unknown_configured_type_is_rejected() {
        let err = select_line_item(
            &package(None),
            &entry(DeliveryType::NonGuaranteed, json!({ "line_item_type": "AD_EXCHANGE" })),
            &cpm_auction(),
        )
        .unwrap_err();
        assert!(matches!(err, GamError::UnknownLineItemType { .. }));
    }

    #[test]
    fn configured_priority_in_range_overrides_default() {
        let sel = select_line_item(
            &package(Some(1000)),
            &entry(DeliveryType::Guaranteed, json!({ "priority": 6 })),
            &cpm_fixed(),
        )
        .unwrap();
        assert_eq!(sel.priority, 6);
    }

    #[test]
    fn out_of_range_priority_falls_back_to_default() {
        for bad in [json!(0), json!(17), json!(-3), json!("high")] {
            let sel = select_line_item(
                &package(Some(1000)),
                &entry(DeliveryType::Guaranteed, json!({ "priority": bad })),
                &cpm_fixed(),
            )
            .unwrap();
            assert_eq!(sel.priority, 8);
        }
    }

    #[test]
    fn bulk_uses_lifetime_goal() {
        let sel = select_line_item(
            &package(Some(40_000)),
            &entry(DeliveryType::NonGuaranteed, json!({ "line_item_type": "BULK" })),
            &cpm_auction(),
        )
        .unwrap();
        assert_eq!(sel.goal, Some(Goal::lifetime_impressions(40_000)));
    }

    #[test]
    fn standard_goal_is_derived_from_budget_for_cpm() {
        // 5000 / 10 * 1000
        let sel = select_line_item(
            &package(None),
            &entry(DeliveryType::Guaranteed, json!({})),
            &cpm_fixed(),
        )
        .unwrap();
        assert_eq!(sel.goal, Some(Goal::lifetime_impressions(500_000)));
    }

    #[test]
    fn oversized_budget_at_tiny_price_is_reported_not_panicked() {
        let mut pkg = package(None);
        pkg.budget = Decimal::from_i128_with_scale(10_000_000_000_000_000_000_000, 0);
        let tiny = PricingOption::fixed("opt", PricingModel::Cpm, Decimal::new(1, 10), "USD");
        assert!(tiny.validate().is_ok());

        let err = select_line_item(&pkg, &entry(DeliveryType::Guaranteed, json!({})), &tiny)
            .unwrap_err();
        assert_eq!(
            err,
            GamError::MissingImpressionGoal {
                package_id: "pkg_1".to_string()
            }
        );
    }

    #[test]
    fn standard_cpc_without_impressions_has_no_goal_source() {
        let cpc = PricingOption::fixed("opt", PricingModel::Cpc, Decimal::new(1, 0), "USD");
        let err = select_line_item(&package(None), &entry(DeliveryType::Guaranteed, json!({})), &cpc)
            .unwrap_err();
        assert!(matches!(err, GamError::MissingImpressionGoal { .. }));
    }

    #[test]
    fn unsupported_pricing_models_are_rejected() {
        for model in [PricingModel::Cpcv, PricingModel::Cpv, PricingModel::Cpp] {
            let option = PricingOption::fixed("opt", model, Decimal::new(1, 0), "USD");
            let err = select_line_item(
                &package(Some(1000)),
                &entry(DeliveryType::Guaranteed, json!({})),
                &option,
            )
            .unwrap_err();
            assert!(matches!(err, GamError::UnsupportedPricingModel { .. }));
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_type() -> impl Strategy<Value = LineItemType> {
            prop_oneof![
                Just(LineItemType::Sponsorship),
                Just(LineItemType::Standard),
                Just(LineItemType::Network),
                Just(LineItemType::Bulk),
                Just(LineItemType::PricePriority),
                Just(LineItemType::House),
            ]
        }

        proptest! {
            /// The selected type always belongs to the package's delivery class.
            #[test]
            fn selection_respects_delivery_class(
                guaranteed in any::<bool>(),
                configured in proptest::option::of(any_type()),
            ) {
                let delivery_type = if guaranteed {
                    DeliveryType::Guaranteed
                } else {
                    DeliveryType::NonGuaranteed
                };
                let config = match configured {
                    Some(t) => json!({ "line_item_type": t.as_str() }),
                    None => json!({}),
                };

                match select_line_item(&package(Some(1000)), &entry(delivery_type, config), &cpm_fixed()) {
                    Ok(sel) => prop_assert_eq!(sel.line_item_type.is_guaranteed(), guaranteed),
                    Err(GamError::IncompatibleLineItemType { .. }) => {
                        prop_assert!(configured.is_some_and(|t| t.is_guaranteed() != guaranteed));
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
            }
        }
    }
}
