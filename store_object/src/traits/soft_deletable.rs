//! Soft-delete capability
//!
//! Entities implementing [`SoftDeletable`] are never physically erased by a
//! normal delete: saving a deleted entry flips the flag and writes an update,
//! and reads skip flagged rows unless the query asks for removed rows.

/// Capability for entities carrying an "is removed" flag
pub trait SoftDeletable {
    /// Whether the entity is logically removed
    fn is_removed(&self) -> bool;

    /// Set the logical removal flag
    fn set_removed(&mut self, removed: bool);

    /// Storage column holding the flag
    fn removed_field() -> &'static str
    where
        Self: Sized,
    {
        "is_deleted"
    }
}
