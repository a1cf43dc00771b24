use std::collections::BTreeSet;
use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Media channel tag, canonical AdCP V3 names.
///
/// Legacy V2 names are accepted on input only: `video` is `olv`, `native` is
/// `social`, `audio` is `streaming_audio`. Tags outside the taxonomy are kept
/// (lower-cased) as [`Channel::Other`] so they still compare by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Display,
    Olv,
    Social,
    Search,
    Ctv,
    LinearTv,
    Radio,
    StreamingAudio,
    Podcast,
    Dooh,
    Ooh,
    Print,
    Cinema,
    Email,
    Gaming,
    RetailMedia,
    Influencer,
    Affiliate,
    ProductPlacement,
    Other(String),
}

impl Channel {
    /// Normalize a raw tag: trim, lower-case, `-`/space to `_`, then resolve aliases.
    pub fn parse(raw: &str) -> Channel {
        let tag: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match tag.as_str() {
            "display" => Channel::Display,
            "olv" | "video" => Channel::Olv,
            "social" | "native" => Channel::Social,
            "search" => Channel::Search,
            "ctv" => Channel::Ctv,
            "linear_tv" => Channel::LinearTv,
            "radio" => Channel::Radio,
            "streaming_audio" | "audio" => Channel::StreamingAudio,
            "podcast" => Channel::Podcast,
            "dooh" => Channel::Dooh,
            "ooh" => Channel::Ooh,
            "print" => Channel::Print,
            "cinema" => Channel::Cinema,
            "email" => Channel::Email,
            "gaming" => Channel::Gaming,
            "retail_media" => Channel::RetailMedia,
            "influencer" => Channel::Influencer,
            "affiliate" => Channel::Affiliate,
            "product_placement" => Channel::ProductPlacement,
            _ => Channel::Other(tag),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Channel::Display => "display",
            Channel::Olv => "olv",
            Channel::Social => "social",
            Channel::Search => "search",
            Channel::Ctv => "ctv",
            Channel::LinearTv => "linear_tv",
            Channel::Radio => "radio",
            Channel::StreamingAudio => "streaming_audio",
            Channel::Podcast => "podcast",
            Channel::Dooh => "dooh",
            Channel::Ooh => "ooh",
            Channel::Print => "print",
            Channel::Cinema => "cinema",
            Channel::Email => "email",
            Channel::Gaming => "gaming",
            Channel::RetailMedia => "retail_media",
            Channel::Influencer => "influencer",
            Channel::Affiliate => "affiliate",
            Channel::ProductPlacement => "product_placement",
            Channel::Other(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Channel::Other(_))
    }
}

/// Normalize a list of raw tags into a canonical set. Blank entries are dropped.
pub fn normalize_channels<I, S>(raw: I) -> BTreeSet<Channel>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter(|s| !s.as_ref().trim().is_empty())
        .map(|s| Channel::parse(s.as_ref()))
        .collect()
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Channel::parse(s))
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Deserialization is an ingestion boundary: aliases resolve here.
impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Channel::parse(&raw))
    }
}
