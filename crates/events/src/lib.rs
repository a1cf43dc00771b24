//! Domain events emitted by the product catalog and media-buy aggregates.

pub mod event;
pub mod record;

pub use event::Event;
pub use record::EventRecord;
