//! Channel taxonomy and adapter capabilities.
//!
//! Every channel tag that enters the system (product records, buyer filters,
//! tenant configuration) goes through [`Channel::parse`], so comparisons
//! elsewhere always happen on canonical V3 tags.

pub mod adapter;
pub mod channel;

pub use adapter::{AdapterCapabilities, AdapterType, ChannelCapabilities, default_channels};
pub use channel::{Channel, normalize_channels};
