//! Entity metadata
//!
//! Every persisted record type implements [`Entity`], describing its table,
//! its storage columns and the capabilities it opts into.

use crate::traits::{SoftDeletable, TimeTracked};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Numeric surrogate key, unique within one entity type
///
/// `0` marks an entity whose key has not been assigned by the engine yet.
pub type EntityId = i64;

/// Storage column description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    /// PostgreSQL column type used when creating the table
    pub sql_type: &'static str,
    pub nullable: bool,
    /// Table whose primary key this column refers to
    pub references: Option<&'static str>,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            nullable: false,
            references: None,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }
}

/// Column names of the audit timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampColumns {
    pub created_at: &'static str,
    pub updated_at: &'static str,
}

/// Static capability set of an entity type
///
/// Built from the capability traits, so a type can only declare a capability
/// it actually implements:
///
/// ```ignore
/// fn capabilities() -> Capabilities {
///     Capabilities::none()
///         .soft_delete::<Self>()
///         .time_tracking::<Self>()
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    soft_delete: Option<&'static str>,
    time_tracking: Option<TimestampColumns>,
}

impl Capabilities {
    pub const fn none() -> Self {
        Self {
            soft_delete: None,
            time_tracking: None,
        }
    }

    pub fn soft_delete<T: SoftDeletable>(mut self) -> Self {
        self.soft_delete = Some(T::removed_field());
        self
    }

    pub fn time_tracking<T: TimeTracked>(mut self) -> Self {
        self.time_tracking = Some(TimestampColumns {
            created_at: T::created_field(),
            updated_at: T::updated_field(),
        });
        self
    }

    /// Column of the removal flag, if the type is soft-deletable
    pub fn removed_field(&self) -> Option<&'static str> {
        self.soft_delete
    }

    /// Timestamp columns, if the type is time-tracked
    pub fn timestamp_fields(&self) -> Option<TimestampColumns> {
        self.time_tracking
    }

    pub fn is_soft_deletable(&self) -> bool {
        self.soft_delete.is_some()
    }

    pub fn is_time_tracked(&self) -> bool {
        self.time_tracking.is_some()
    }
}

/// Metadata and capability access for a persisted record type
///
/// Rows are exchanged with engines as the serde JSON form of the entity, so
/// the serialized field names must match [`Entity::columns`].
pub trait Entity: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// The table name in the database
    fn table_name() -> &'static str;

    /// Storage columns, primary key included
    fn columns() -> &'static [Column];

    /// The primary key column
    fn primary_key_field() -> &'static str {
        "id"
    }

    /// Capabilities this type opts into
    fn capabilities() -> Capabilities {
        Capabilities::none()
    }

    fn id(&self) -> EntityId;

    fn set_id(&mut self, id: EntityId);

    /// Soft-delete view of this entity, when the capability is declared
    fn as_soft_deletable(&mut self) -> Option<&mut dyn SoftDeletable> {
        None
    }

    /// Timestamp view of this entity, when the capability is declared
    fn as_time_tracked(&mut self) -> Option<&mut dyn TimeTracked> {
        None
    }
}

/// Table layout derived from an [`Entity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [Column],
}

impl TableSchema {
    pub fn of<T: Entity>() -> Self {
        Self {
            name: T::table_name(),
            primary_key: T::primary_key_field(),
            columns: T::columns(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Columns written on insert and update (everything but the primary key)
    pub fn data_columns(&self) -> impl Iterator<Item = &Column> {
        let primary_key = self.primary_key;
        self.columns
            .iter()
            .filter(move |column| column.name != primary_key)
    }
}
