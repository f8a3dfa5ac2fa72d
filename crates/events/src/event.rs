use chrono::{DateTime, Utc};

/// Something that happened, stated as an immutable fact.
///
/// Implementors are notification payloads: cheap to clone, safe to re-deliver,
/// and identified by a stable wire name consumers can dispatch on.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "stock.changed").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
