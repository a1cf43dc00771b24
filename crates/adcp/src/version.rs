use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First protocol major version without the deprecated V2 pricing fields.
pub const FIRST_V3_MAJOR: u64 = 3;

/// Client-declared AdCP version, `MAJOR[.MINOR[.PATCH]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("version string is empty")]
    Empty,
    #[error("malformed version string: {0}")]
    Malformed(String),
}

impl FromStr for ProtocolVersion {
    type Err = VersionParseError;

    /// Accepts an optional leading `v` and ignores `-pre`/`+build` suffixes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let unprefixed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let core = unprefixed
            .split(['-', '+'])
            .next()
            .unwrap_or_default();

        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(VersionParseError::Malformed(s.to_string()));
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(VersionParseError::Malformed(s.to_string()));
            }
            *slot = part
                .parse()
                .map_err(|_| VersionParseError::Malformed(s.to_string()))?;
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
        })
    }
}

impl core::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Whether a response must carry the deprecated V2 fields.
///
/// Only a parseable version with major >= 3 opts out; absent, empty and
/// malformed versions are treated as legacy clients.
pub fn needs_v2_compat(version: Option<&str>) -> bool {
    match version.map(str::parse::<ProtocolVersion>) {
        Some(Ok(v)) => v.major < FIRST_V3_MAJOR,
        _ => true,
    }
}

/// Per-request response shape decided by [`needs_v2_compat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatMode {
    /// V3 fields plus `is_fixed`, `rate` and `price_guidance.floor`.
    V2Compat,
    /// V3 fields only.
    V3,
}

impl CompatMode {
    pub fn for_client(version: Option<&str>) -> Self {
        if needs_v2_compat(version) {
            CompatMode::V2Compat
        } else {
            CompatMode::V3
        }
    }

    pub fn includes_v2_fields(self) -> bool {
        matches!(self, CompatMode::V2Compat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_version_needs_compat() {
        assert!(needs_v2_compat(None));
    }

    #[test]
    fn empty_version_needs_compat() {
        assert!(needs_v2_compat(Some("")));
        assert!(needs_v2_compat(Some("   ")));
    }

    #[test]
    fn v2_versions_need_compat() {
        assert!(needs_v2_compat(Some("2.5.0")));
        assert!(needs_v2_compat(Some("1")));
        assert!(needs_v2_compat(Some("2.99.99")));
    }

    #[test]
    fn v3_and_later_do_not_need_compat() {
        assert!(!needs_v2_compat(Some("3.0.0")));
        assert!(!needs_v2_compat(Some("3")));
        assert!(!needs_v2_compat(Some("v3.1")));
        assert!(!needs_v2_compat(Some("3.0.0-beta.2")));
        assert!(!needs_v2_compat(Some("4.2.1+build.7")));
    }

    #[test]
    fn malformed_versions_need_compat() {
        assert!(needs_v2_compat(Some("garbage")));
        assert!(needs_v2_compat(Some("3.x")));
        assert!(needs_v2_compat(Some("3.0.0.0")));
        assert!(needs_v2_compat(Some("..")));
        assert!(needs_v2_compat(Some("-3.0.0")));
    }

    #[test]
    fn parse_fills_missing_components_with_zero() {
        let v: ProtocolVersion = "3.1".parse().unwrap();
        assert_eq!(v, ProtocolVersion { major: 3, minor: 1, patch: 0 });
        assert_eq!(v.to_string(), "3.1.0");
    }

    #[test]
    fn parse_errors_are_typed() {
        assert_eq!("".parse::<ProtocolVersion>(), Err(VersionParseError::Empty));
        assert!(matches!(
            "abc".parse::<ProtocolVersion>(),
            Err(VersionParseError::Malformed(_))
        ));
    }

    #[test]
    fn compat_mode_follows_gate() {
        assert_eq!(CompatMode::for_client(None), CompatMode::V2Compat);
        assert_eq!(CompatMode::for_client(Some("3.0.0")), CompatMode::V3);
        assert!(!CompatMode::V3.includes_v2_fields());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn gate_depends_only_on_major(major in 0u64..10, minor in 0u64..100, patch in 0u64..100) {
                let version = format!("{major}.{minor}.{patch}");
                prop_assert_eq!(needs_v2_compat(Some(&version)), major < FIRST_V3_MAJOR);
            }

            /// Strings with no digits at all are never mistaken for V3.
            #[test]
            fn digitless_strings_need_compat(raw in "[a-zA-Z .+-]{0,16}") {
                prop_assert!(needs_v2_compat(Some(&raw)));
            }
        }
    }
}
