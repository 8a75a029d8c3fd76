use chrono::{DateTime, Utc};

/// A fact about something that already happened in the domain.
///
/// Implementors are plain value enums/structs: cloneable, immutable once
/// constructed, and carrying their own business timestamp. The `version`
/// exists so persisted events can evolve their schema without breaking old
/// readers.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted identifier, e.g. "order.paid".
    fn event_type(&self) -> &'static str;

    /// Schema version of this event type.
    fn version(&self) -> u32;

    /// Business time at which the fact occurred.
    fn occurred_at(&self) -> DateTime<Utc>;
}
