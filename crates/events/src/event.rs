use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are immutable facts. Each carries a stable type name so observers
/// outside the process (SSE clients, logs) can dispatch on it.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "purchasing.purchase.started").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred.
    fn occurred_at(&self) -> DateTime<Utc>;
}
