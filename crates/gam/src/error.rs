use thiserror::Error;

use salesagent_media_buy::MediaBuyError;
use salesagent_products::PricingModel;

use crate::line_item::LineItemType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GamError {
    #[error("package '{package_id}': unknown line_item_type '{value}'")]
    UnknownLineItemType { package_id: String, value: String },

    #[error(
        "package '{package_id}': line item type {line_item_type} cannot be used for {} delivery",
        delivery_label(.guaranteed)
    )]
    IncompatibleLineItemType {
        package_id: String,
        line_item_type: LineItemType,
        guaranteed: bool,
    },

    #[error("package '{package_id}': pricing model {model:?} has no ad server cost type")]
    UnsupportedPricingModel {
        package_id: String,
        model: PricingModel,
    },

    #[error("package '{package_id}': no impression goal and none can be derived from the budget")]
    MissingImpressionGoal { package_id: String },

    #[error("package '{package_id}': no product metadata in the media buy")]
    MissingPackageMetadata { package_id: String },

    #[error("package '{package_id}': product or pricing option '{pricing_option_id}' not found")]
    UnknownPricingOption {
        package_id: String,
        pricing_option_id: String,
    },

    #[error(transparent)]
    MediaBuy(#[from] MediaBuyError),

    #[error("ad server request failed: {0}")]
    Rpc(String),
}

fn delivery_label(guaranteed: &bool) -> &'static str {
    if *guaranteed { "guaranteed" } else { "non-guaranteed" }
}
