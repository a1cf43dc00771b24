use thiserror::Error;

use salesagent_core::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaBuyError {
    #[error("package '{package_id}' references unknown product '{product_id}'")]
    UnknownProduct {
        package_id: String,
        product_id: String,
    },

    #[error("package '{package_id}' references unknown pricing option '{pricing_option_id}'")]
    UnknownPricingOption {
        package_id: String,
        pricing_option_id: String,
    },

    #[error("duplicate package id '{package_id}'")]
    DuplicatePackage { package_id: String },

    /// A packages-to-products entry without `delivery_type`. Line-item
    /// selection cannot proceed without it.
    #[error("package '{package_id}' is missing delivery_type in its product metadata")]
    MissingDeliveryType { package_id: String },

    #[error("malformed packages-to-products map: {0}")]
    MalformedPackagesMap(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl MediaBuyError {
    /// Errors caused by product/tenant setup rather than by the buyer's request.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            MediaBuyError::MissingDeliveryType { .. } | MediaBuyError::MalformedPackagesMap(_)
        )
    }
}
