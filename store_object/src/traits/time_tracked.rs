//! Audit timestamp capability

use chrono::{DateTime, Utc};

/// Capability for entities carrying creation and last-update timestamps.
///
/// `created_at` is written once, when the entity is first persisted.
/// `updated_at` is written on every persist, the first one included.
pub trait TimeTracked {
    fn created_at(&self) -> DateTime<Utc>;

    fn set_created_at(&mut self, at: DateTime<Utc>);

    fn updated_at(&self) -> DateTime<Utc>;

    fn set_updated_at(&mut self, at: DateTime<Utc>);

    /// Storage column for the creation stamp
    fn created_field() -> &'static str
    where
        Self: Sized,
    {
        "created_at"
    }

    /// Storage column for the update stamp
    fn updated_field() -> &'static str
    where
        Self: Sized,
    {
        "updated_at"
    }
}
