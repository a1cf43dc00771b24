//! Serialized form of an event, kept as an audit trail next to the aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use salesagent_core::TenantId;

use crate::Event;

/// A typed event flattened to JSON together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    /// Id of the aggregate the event belongs to (product id, media buy id).
    pub stream_id: String,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl EventRecord {
    /// Serialize a typed event. Fails only if the payload is not representable as JSON.
    pub fn from_typed<E>(
        tenant_id: TenantId,
        stream_id: impl Into<String>,
        event: &E,
    ) -> Result<Self, serde_json::Error>
    where
        E: Event + Serialize,
    {
        Ok(Self {
            event_id: Uuid::now_v7(),
            tenant_id,
            stream_id: stream_id.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload: serde_json::to_value(event)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Pinged {
        at: DateTime<Utc>,
    }

    impl Event for Pinged {
        fn event_type(&self) -> &'static str {
            "test.pinged"
        }

        fn version(&self) -> u32 {
            2
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn record_carries_event_metadata() {
        let tenant_id = TenantId::new();
        let at = Utc::now();
        let record = EventRecord::from_typed(tenant_id, "mb_1", &Pinged { at }).unwrap();

        assert_eq!(record.tenant_id, tenant_id);
        assert_eq!(record.stream_id, "mb_1");
        assert_eq!(record.event_type, "test.pinged");
        assert_eq!(record.event_version, 2);
        assert_eq!(record.occurred_at, at);
        assert!(record.payload.get("at").is_some());
    }
}
