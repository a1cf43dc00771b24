//! Wire shapes for `get_products`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use salesagent_channels::{Channel, ChannelCapabilities};
use salesagent_products::{DeliveryType, PricingModel, PricingOption, Product};

use crate::version::CompatMode;

/// Price hints on the wire. `floor` is only emitted for V2 clients; V3 carries
/// it as `floor_price` on the option itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriceGuidanceResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p25: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p75: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p90: Option<Decimal>,
}

impl PriceGuidanceResponse {
    fn is_empty(&self) -> bool {
        self.floor.is_none()
            && self.p25.is_none()
            && self.p50.is_none()
            && self.p75.is_none()
            && self.p90.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingOptionResponse {
    pub pricing_option_id: String,
    pub pricing_model: PricingModel,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_guidance: Option<PriceGuidanceResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_spend_per_package: Option<Decimal>,

    // Deprecated V2 fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_fixed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
}

impl PricingOptionResponse {
    pub fn build(option: &PricingOption, compat: CompatMode) -> Self {
        let v2 = compat.includes_v2_fields();
        let fixed_price = option.fixed_price();
        let floor_price = option.floor_price();

        let price_guidance = option
            .price_guidance
            .as_ref()
            .map(|g| PriceGuidanceResponse {
                floor: if v2 { floor_price } else { None },
                p25: g.p25,
                p50: g.p50,
                p75: g.p75,
                p90: g.p90,
            })
            .filter(|g| !g.is_empty());

        Self {
            pricing_option_id: option.pricing_option_id.clone(),
            pricing_model: option.pricing_model,
            currency: option.currency.clone(),
            fixed_price,
            floor_price,
            price_guidance,
            min_spend_per_package: option.min_spend_per_package,
            is_fixed: v2.then_some(option.is_fixed),
            rate: if v2 { fixed_price } else { None },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductResponse {
    pub product_id: String,
    pub name: String,
    pub description: String,
    pub format_ids: Vec<String>,
    pub delivery_type: DeliveryType,
    /// Effective channels: declared, or the adapter defaults when none are.
    pub channels: BTreeSet<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String>>,
    pub pricing_options: Vec<PricingOptionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ProductResponse {
    pub fn build<A>(product: &Product, adapter: &A, compat: CompatMode) -> Self
    where
        A: ChannelCapabilities + ?Sized,
    {
        let channels = match product.channels() {
            Some(declared) => declared.clone(),
            None => adapter.default_channels().iter().cloned().collect(),
        };

        Self {
            product_id: product.id_typed().as_str().to_string(),
            name: product.name().to_string(),
            description: product.description().to_string(),
            format_ids: product.format_ids().to_vec(),
            delivery_type: product.delivery_type(),
            channels,
            countries: product
                .countries()
                .map(|set| set.iter().map(|c| c.as_str().to_string()).collect()),
            pricing_options: product
                .pricing_options()
                .iter()
                .map(|o| PricingOptionResponse::build(o, compat))
                .collect(),
            expires_at: product.expires_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetProductsResponse {
    pub products: Vec<ProductResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GetProductsResponse {
    pub fn build<'p, A, I>(products: I, adapter: &A, compat: CompatMode) -> Self
    where
        A: ChannelCapabilities + ?Sized,
        I: IntoIterator<Item = &'p Product>,
    {
        let products: Vec<ProductResponse> = products
            .into_iter()
            .map(|p| ProductResponse::build(p, adapter, compat))
            .collect();
        let message = products
            .is_empty()
            .then(|| "No products matched the requested criteria".to_string());

        Self { products, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use salesagent_channels::AdapterType;
    use salesagent_core::TenantId;
    use salesagent_products::{PriceGuidance, ProductId, PublishProduct};
    use serde_json::{Value as JsonValue, json};

    fn fixed_cpm() -> PricingOption {
        PricingOption::fixed("cpm_fixed", PricingModel::Cpm, Decimal::new(1250, 2), "USD")
    }

    fn auction_cpm() -> PricingOption {
        let mut option =
            PricingOption::auction("cpm_auction", PricingModel::Cpm, Some(Decimal::new(5, 0)), "USD");
        if let Some(guidance) = option.price_guidance.as_mut() {
            guidance.p50 = Some(Decimal::new(8, 0));
        }
        option
    }

    fn to_json(option: &PricingOption, compat: CompatMode) -> JsonValue {
        serde_json::to_value(PricingOptionResponse::build(option, compat)).unwrap()
    }

    #[test]
    fn v3_fixed_option_has_no_deprecated_fields() {
        let json = to_json(&fixed_cpm(), CompatMode::V3);
        assert_eq!(json["fixed_price"], json!("12.50"));
        assert!(json.get("is_fixed").is_none());
        assert!(json.get("rate").is_none());
        assert!(json.get("floor_price").is_none());
    }

    #[test]
    fn v2_fixed_option_carries_is_fixed_and_rate() {
        let json = to_json(&fixed_cpm(), CompatMode::V2Compat);
        assert_eq!(json["is_fixed"], json!(true));
        assert_eq!(json["rate"], json!("12.50"));
        assert_eq!(json["fixed_price"], json!("12.50"));
    }

    #[test]
    fn v3_auction_option_exposes_floor_price_only_at_top_level() {
        let json = to_json(&auction_cpm(), CompatMode::V3);
        assert_eq!(json["floor_price"], json!("5"));
        assert!(json["price_guidance"].get("floor").is_none());
        assert_eq!(json["price_guidance"]["p50"], json!("8"));
    }

    #[test]
    fn v2_auction_option_carries_guidance_floor() {
        let json = to_json(&auction_cpm(), CompatMode::V2Compat);
        assert_eq!(json["is_fixed"], json!(false));
        assert!(json.get("rate").is_none());
        assert_eq!(json["price_guidance"]["floor"], json!("5"));
        assert_eq!(json["floor_price"], json!("5"));
    }

    #[test]
    fn floor_only_guidance_is_dropped_for_v3() {
        let option = PricingOption {
            price_guidance: Some(PriceGuidance {
                floor: Some(Decimal::new(2, 0)),
                ..PriceGuidance::default()
            }),
            ..PricingOption::auction("a", PricingModel::Cpm, None, "EUR")
        };
        let json = to_json(&option, CompatMode::V3);
        assert!(json.get("price_guidance").is_none());
        assert_eq!(json["floor_price"], json!("2"));
    }

    fn product(channels: Option<&[&str]>) -> Product {
        Product::publish(PublishProduct {
            tenant_id: TenantId::new(),
            product_id: ProductId::new("prod_1"),
            name: "Homepage takeover".to_string(),
            description: "Premium placement".to_string(),
            format_ids: vec!["display_300x250".to_string()],
            delivery_type: DeliveryType::Guaranteed,
            pricing_options: vec![fixed_cpm()],
            countries: None,
            channels: channels.map(salesagent_channels::normalize_channels),
            implementation_config: json!({}),
            expires_at: None,
            occurred_at: Utc::now(),
        })
        .unwrap()
    }

    #[test]
    fn product_without_channels_reports_adapter_defaults() {
        let response = ProductResponse::build(&product(None), &AdapterType::Triton, CompatMode::V3);
        let channels: Vec<&str> = response.channels.iter().map(Channel::as_str).collect();
        assert_eq!(channels, vec!["streaming_audio", "podcast"]);
    }

    #[test]
    fn product_with_channels_reports_declared_set() {
        let response = ProductResponse::build(
            &product(Some(&["video"])),
            &AdapterType::GoogleAdManager,
            CompatMode::V3,
        );
        assert_eq!(response.channels.len(), 1);
        assert!(response.channels.contains(&Channel::Olv));
    }

    #[test]
    fn one_mode_shapes_every_option_in_a_response() {
        let p = product(None);
        let response =
            GetProductsResponse::build([&p, &p], &AdapterType::GoogleAdManager, CompatMode::V2Compat);
        assert!(
            response
                .products
                .iter()
                .flat_map(|p| &p.pricing_options)
                .all(|o| o.is_fixed.is_some())
        );
        assert!(response.message.is_none());
    }

    #[test]
    fn empty_result_has_message() {
        let response =
            GetProductsResponse::build(Vec::<&Product>::new(), &AdapterType::Mock, CompatMode::V3);
        assert!(response.products.is_empty());
        assert!(response.message.is_some());
    }
}
