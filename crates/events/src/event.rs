use chrono::{DateTime, Utc};

/// An event emitted by a catalog or media-buy aggregate.
///
/// Events are facts: never mutated, versioned per `event_type`, append-only.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name, e.g. `"media_buy.approved"`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version for this event type.
    fn version(&self) -> u32;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;
}
