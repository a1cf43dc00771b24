use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salesagent_core::DomainError;

/// How a product is fulfilled: reserved inventory or auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    Guaranteed,
    NonGuaranteed,
}

impl DeliveryType {
    pub fn is_guaranteed(self) -> bool {
        matches!(self, DeliveryType::Guaranteed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryType::Guaranteed => "guaranteed",
            DeliveryType::NonGuaranteed => "non_guaranteed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    Cpm,
    Vcpm,
    Cpc,
    Cpcv,
    Cpv,
    Cpp,
    FlatRate,
}

/// Auction price hints. `floor` is the minimum acceptable bid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceGuidance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p25: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p50: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p75: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p90: Option<Decimal>,
}

/// A way to buy a product. Stored in one shape; the wire shape (V2 or V3)
/// is produced by the response builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingOption {
    pub pricing_option_id: String,
    pub pricing_model: PricingModel,
    /// ISO 4217 code, upper-case.
    pub currency: String,
    /// Fixed price (`true`) or auction (`false`).
    pub is_fixed: bool,
    /// Price per unit for fixed options.
    #[serde(default)]
    pub rate: Option<Decimal>,
    #[serde(default)]
    pub price_guidance: Option<PriceGuidance>,
    #[serde(default)]
    pub min_spend_per_package: Option<Decimal>,
}

impl PricingOption {
    pub fn fixed(
        pricing_option_id: impl Into<String>,
        pricing_model: PricingModel,
        rate: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            pricing_option_id: pricing_option_id.into(),
            pricing_model,
            currency: currency.into(),
            is_fixed: true,
            rate: Some(rate),
            price_guidance: None,
            min_spend_per_package: None,
        }
    }

    pub fn auction(
        pricing_option_id: impl Into<String>,
        pricing_model: PricingModel,
        floor: Option<Decimal>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            pricing_option_id: pricing_option_id.into(),
            pricing_model,
            currency: currency.into(),
            is_fixed: false,
            rate: None,
            price_guidance: floor.map(|floor| PriceGuidance {
                floor: Some(floor),
                ..PriceGuidance::default()
            }),
            min_spend_per_package: None,
        }
    }

    pub fn with_min_spend(mut self, min_spend: Decimal) -> Self {
        self.min_spend_per_package = Some(min_spend);
        self
    }

    pub fn fixed_price(&self) -> Option<Decimal> {
        if self.is_fixed { self.rate } else { None }
    }

    pub fn floor_price(&self) -> Option<Decimal> {
        if self.is_fixed {
            return None;
        }
        self.price_guidance.as_ref().and_then(|g| g.floor)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.pricing_option_id.trim().is_empty() {
            return Err(DomainError::validation("pricing_option_id cannot be empty"));
        }

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::validation(format!(
                "pricing option '{}': currency must be an upper-case ISO 4217 code",
                self.pricing_option_id
            )));
        }

        match (self.is_fixed, self.rate) {
            (true, None) => {
                return Err(DomainError::validation(format!(
                    "pricing option '{}': fixed pricing requires a rate",
                    self.pricing_option_id
                )));
            }
            (true, Some(rate)) if rate <= Decimal::ZERO => {
                return Err(DomainError::validation(format!(
                    "pricing option '{}': rate must be positive",
                    self.pricing_option_id
                )));
            }
            (false, Some(_)) => {
                return Err(DomainError::validation(format!(
                    "pricing option '{}': auction pricing cannot carry a fixed rate",
                    self.pricing_option_id
                )));
            }
            _ => {}
        }

        if let Some(floor) = self.price_guidance.as_ref().and_then(|g| g.floor) {
            if floor < Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "pricing option '{}': floor cannot be negative",
                    self.pricing_option_id
                )));
            }
        }

        if matches!(self.min_spend_per_package, Some(min) if min < Decimal::ZERO) {
            return Err(DomainError::validation(format!(
                "pricing option '{}': min_spend_per_package cannot be negative",
                self.pricing_option_id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_option_exposes_fixed_price_only() {
        let opt = PricingOption::fixed("cpm_usd_fixed", PricingModel::Cpm, Decimal::new(1250, 2), "USD");
        assert_eq!(opt.fixed_price(), Some(Decimal::new(1250, 2)));
        assert_eq!(opt.floor_price(), None);
        assert!(opt.validate().is_ok());
    }

    #[test]
    fn auction_option_exposes_floor_only() {
        let opt = PricingOption::auction("cpm_usd_auction", PricingModel::Cpm, Some(Decimal::new(5, 0)), "USD");
        assert_eq!(opt.fixed_price(), None);
        assert_eq!(opt.floor_price(), Some(Decimal::new(5, 0)));
        assert!(opt.validate().is_ok());
    }

    #[test]
    fn fixed_option_without_rate_is_rejected() {
        let mut opt = PricingOption::fixed("p", PricingModel::Cpm, Decimal::ONE, "USD");
        opt.rate = None;
        assert!(matches!(opt.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn lowercase_currency_is_rejected() {
        let opt = PricingOption::fixed("p", PricingModel::Cpm, Decimal::ONE, "usd");
        assert!(opt.validate().is_err());
    }

    #[test]
    fn delivery_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DeliveryType::NonGuaranteed).unwrap(),
            r#""non_guaranteed""#
        );
        assert_eq!(DeliveryType::Guaranteed.as_str(), "guaranteed");
    }
}
