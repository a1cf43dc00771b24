use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use salesagent_core::{DomainError, TenantId};

/// Kinds of ad-server inventory mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryItemType {
    AdUnit,
    Placement,
    Label,
    CustomTargetingKey,
    CustomTargetingValue,
    AudienceSegment,
}

impl InventoryItemType {
    /// Discovery order of a sync run. Keys precede values.
    pub const ALL: [InventoryItemType; 6] = [
        InventoryItemType::AdUnit,
        InventoryItemType::Placement,
        InventoryItemType::Label,
        InventoryItemType::CustomTargetingKey,
        InventoryItemType::CustomTargetingValue,
        InventoryItemType::AudienceSegment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InventoryItemType::AdUnit => "ad_unit",
            InventoryItemType::Placement => "placement",
            InventoryItemType::Label => "label",
            InventoryItemType::CustomTargetingKey => "custom_targeting_key",
            InventoryItemType::CustomTargetingValue => "custom_targeting_value",
            InventoryItemType::AudienceSegment => "audience_segment",
        }
    }
}

impl core::fmt::Display for InventoryItemType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for InventoryItemType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InventoryItemType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown inventory item type '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryItemStatus {
    Active,
    /// Not observed by the most recent full sync.
    Stale,
}

impl InventoryItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InventoryItemStatus::Active => "active",
            InventoryItemStatus::Stale => "stale",
        }
    }
}

/// An item as reported by the ad server during discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    pub item_type: InventoryItemType,
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: JsonValue,
}

impl DiscoveredItem {
    pub fn new(
        item_type: InventoryItemType,
        external_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            item_type,
            external_id: external_id.into(),
            name: name.into(),
            metadata: JsonValue::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Local mirror of one ad-server item. Keyed by `(tenant_id, item_type, external_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub tenant_id: TenantId,
    pub item_type: InventoryItemType,
    pub external_id: String,
    pub name: String,
    pub metadata: JsonValue,
    pub status: InventoryItemStatus,
    pub last_synced_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn observed(tenant_id: TenantId, item: &DiscoveredItem, synced_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            item_type: item.item_type,
            external_id: item.external_id.clone(),
            name: item.name.clone(),
            metadata: item.metadata.clone(),
            status: InventoryItemStatus::Active,
            last_synced_at: synced_at,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.status == InventoryItemStatus::Stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_names_round_trip() {
        for t in InventoryItemType::ALL {
            assert_eq!(t.as_str().parse::<InventoryItemType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_item_type_is_rejected() {
        assert!("creative".parse::<InventoryItemType>().is_err());
    }

    #[test]
    fn observed_item_is_active() {
        let now = Utc::now();
        let discovered = DiscoveredItem::new(InventoryItemType::AdUnit, "123", "Homepage");
        let item = InventoryItem::observed(TenantId::new(), &discovered, now);
        assert!(!item.is_stale());
        assert_eq!(item.last_synced_at, now);
    }
}
