//! Media buys: the packages a principal buys, the per-package product metadata
//! handed to order construction, and the approval lifecycle.

pub mod error;
pub mod media_buy;
pub mod package;
pub mod packages_map;

pub use error::MediaBuyError;
pub use media_buy::{
    AdServerOrderFailed, AdServerOrderRecorded, ApproveMediaBuy, CreateMediaBuy, MediaBuy,
    MediaBuyApproved, MediaBuyCommand, MediaBuyCreated, MediaBuyEvent, MediaBuyId,
    MediaBuyRejected, MediaBuyStatus, RecordAdServerOrder, RecordOrderFailure, RejectMediaBuy,
};
pub use package::{PackageId, PackageRequest};
pub use packages_map::{PackageProductEntry, PackagesProductsMap, build_packages_products_map};
