use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::channel::Channel;

static NO_CHANNELS: [Channel; 0] = [];

static GAM_CHANNELS: [Channel; 3] = [Channel::Display, Channel::Olv, Channel::Social];

static KEVEL_CHANNELS: [Channel; 3] = [Channel::Display, Channel::Social, Channel::RetailMedia];

static TRITON_CHANNELS: [Channel; 2] = [Channel::StreamingAudio, Channel::Podcast];

static XANDR_CHANNELS: [Channel; 3] = [Channel::Display, Channel::Olv, Channel::Ctv];

static MOCK_CHANNELS: [Channel; 8] = [
    Channel::Display,
    Channel::Olv,
    Channel::Social,
    Channel::Ctv,
    Channel::StreamingAudio,
    Channel::Podcast,
    Channel::RetailMedia,
    Channel::Dooh,
];

/// Ad-server adapter a tenant is configured with.
///
/// Tagged variants replace probing adapters for optional attributes: every
/// capability question is answered by matching on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AdapterType {
    GoogleAdManager,
    Kevel,
    Triton,
    Xandr,
    /// Generic adapter used for tests and demos; claims the common channels.
    Mock,
    /// Adapter name with no known capabilities.
    Unknown(String),
}

impl AdapterType {
    /// Parse an adapter identifier (case-insensitive, common aliases accepted).
    pub fn parse(raw: &str) -> AdapterType {
        let name = raw.trim().to_ascii_lowercase().replace('-', "_");
        match name.as_str() {
            "google_ad_manager" | "gam" => AdapterType::GoogleAdManager,
            "kevel" => AdapterType::Kevel,
            "triton" | "triton_digital" => AdapterType::Triton,
            "xandr" => AdapterType::Xandr,
            "mock" | "test" => AdapterType::Mock,
            _ => AdapterType::Unknown(name),
        }
    }

    /// Canonical identifier, as stored in tenant configuration.
    pub fn as_str(&self) -> &str {
        match self {
            AdapterType::GoogleAdManager => "google_ad_manager",
            AdapterType::Kevel => "kevel",
            AdapterType::Triton => "triton_digital",
            AdapterType::Xandr => "xandr",
            AdapterType::Mock => "mock",
            AdapterType::Unknown(name) => name,
        }
    }

    pub fn capabilities(&self) -> AdapterCapabilities {
        let (supports_inventory_sync, supports_incremental_sync) = match self {
            AdapterType::GoogleAdManager | AdapterType::Mock => (true, true),
            AdapterType::Kevel | AdapterType::Triton | AdapterType::Xandr => (false, false),
            AdapterType::Unknown(_) => (false, false),
        };

        AdapterCapabilities {
            default_channels: self.default_channels(),
            supports_inventory_sync,
            supports_incremental_sync,
        }
    }
}

/// Static description of what an adapter can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterCapabilities {
    pub default_channels: &'static [Channel],
    pub supports_inventory_sync: bool,
    pub supports_incremental_sync: bool,
}

/// Channels an adapter serves when a product declares none of its own.
pub trait ChannelCapabilities {
    /// Ordered, canonical default channel set. Empty means "no defaults".
    fn default_channels(&self) -> &'static [Channel];

    fn serves_channel(&self, channel: &Channel) -> bool {
        self.default_channels().contains(channel)
    }
}

impl ChannelCapabilities for AdapterType {
    fn default_channels(&self) -> &'static [Channel] {
        match self {
            AdapterType::GoogleAdManager => &GAM_CHANNELS,
            AdapterType::Kevel => &KEVEL_CHANNELS,
            AdapterType::Triton => &TRITON_CHANNELS,
            AdapterType::Xandr => &XANDR_CHANNELS,
            AdapterType::Mock => &MOCK_CHANNELS,
            AdapterType::Unknown(_) => &NO_CHANNELS,
        }
    }
}

/// Default channels for a raw adapter identifier. Unknown adapters yield an empty slice.
pub fn default_channels(adapter_type: &str) -> &'static [Channel] {
    AdapterType::parse(adapter_type).default_channels()
}

impl core::fmt::Display for AdapterType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AdapterType::parse(s))
    }
}

impl Serialize for AdapterType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AdapterType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(AdapterType::parse(&raw))
    }
}
