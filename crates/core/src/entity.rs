//! Catalog records that can be named in audit snapshots.

/// A definition with a stable id and a human label.
///
/// Consumption records copy `display_name` at transaction time so history
/// keeps reading correctly after the definition is renamed or deleted.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    fn display_name(&self) -> &str;

    /// Owned copy of the label for a denormalized snapshot.
    fn snapshot_name(&self) -> String {
        self.display_name().to_string()
    }
}
