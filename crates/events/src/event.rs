//! Base contract for change notifications.

use chrono::{DateTime, Utc};

/// A published fact about the catalog.
///
/// Events are immutable once published and carry business time, never
/// delivery time. They may arrive more than once and out of order;
/// consumers re-read current state rather than trusting a payload, so a
/// replayed event converges instead of corrupting.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted identifier, e.g. `"catalog.product.changed"`.
    /// Consumers route on this, so it never changes for a given shape.
    fn event_type(&self) -> &'static str;

    /// Schema version, bumped on an incompatible payload change.
    fn version(&self) -> u32;

    /// When the change happened at its source.
    fn occurred_at(&self) -> DateTime<Utc>;
}
