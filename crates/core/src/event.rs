use chrono::{DateTime, Utc};

/// A domain event.
///
/// Events are immutable facts describing an accepted change. Stores return them
/// to callers after commit so the bot layer can report what happened.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "stock.lot.destocked").
    fn event_type(&self) -> &'static str;

    /// When the change happened (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
