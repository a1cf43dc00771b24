//! Product catalog domain module.
//!
//! Products are published once and then only change lifecycle timestamps
//! (archive, expiry). The filter engine in [`filter`] is a pure predicate over
//! published products and is what `get_products` runs for every candidate.

pub mod country;
pub mod filter;
pub mod pricing;
pub mod product;

pub use country::CountryCode;
pub use filter::{
    FilterCriteria, ProductFilter, matches, matches_channels, matches_countries,
    matches_delivery_type, matches_format_ids, matches_pricing,
};
pub use pricing::{DeliveryType, PriceGuidance, PricingModel, PricingOption};
pub use product::{
    ArchiveProduct, Product, ProductArchived, ProductCommand, ProductEvent, ProductExpiryChanged,
    ProductId, ProductPublished, ProductStatus, PublishProduct, SetProductExpiry,
};
