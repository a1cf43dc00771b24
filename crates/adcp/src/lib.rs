//! AdCP protocol shaping: the V2/V3 compatibility gate and the response
//! builders that depend on it.
//!
//! The gate is evaluated once per request ([`CompatMode::for_client`]) and the
//! resulting mode is passed to every builder, so a single response never mixes
//! V2 and V3 pricing shapes.

pub mod response;
pub mod version;

pub use response::{GetProductsResponse, PriceGuidanceResponse, PricingOptionResponse, ProductResponse};
pub use version::{CompatMode, ProtocolVersion, VersionParseError, needs_v2_compat};
