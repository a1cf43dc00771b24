use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salesagent_core::DomainError;
use salesagent_products::ProductId;

/// Buyer-assigned package identifier, unique within a media buy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PackageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One package of a media buy: a product bought through one of its pricing
/// options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    pub package_id: PackageId,
    pub product_id: ProductId,
    pub pricing_option_id: String,
    pub budget: Decimal,
    #[serde(default)]
    pub impressions: Option<u64>,
    #[serde(default)]
    pub format_ids: Vec<String>,
}

impl PackageRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.package_id.as_str().trim().is_empty() {
            return Err(DomainError::validation("package_id cannot be empty"));
        }
        if self.budget <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "package '{}': budget must be positive",
                self.package_id
            )));
        }
        if self.impressions == Some(0) {
            return Err(DomainError::validation(format!(
                "package '{}': impressions must be positive when set",
                self.package_id
            )));
        }
        Ok(())
    }
}
