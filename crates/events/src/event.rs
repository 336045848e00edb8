use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An audit fact that can be appended to the journal.
///
/// Implementors are immutable snapshots; the journal never rewrites them.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, e.g. `production.loss.recorded`.
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    /// Business time of the underlying transaction.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Parent transaction id and its stream kind (`production.run`, `inventory.lot`, ...).
    fn stream(&self) -> (Uuid, &'static str);
}
