//! Entity fixtures shared by unit tests

use crate::clock::ManualClock;
use crate::traits::{Capabilities, Column, Entity, EntityId, SoftDeletable, TimeTracked};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
}

pub fn manual_clock() -> ManualClock {
    ManualClock::new(t0())
}

/// Soft-deletable and time-tracked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecturer {
    pub id: EntityId,
    pub name: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lecturer {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            is_deleted: false,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }
}

impl SoftDeletable for Lecturer {
    fn is_removed(&self) -> bool {
        self.is_deleted
    }

    fn set_removed(&mut self, removed: bool) {
        self.is_deleted = removed;
    }
}

impl TimeTracked for Lecturer {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Entity for Lecturer {
    fn table_name() -> &'static str {
        "lecturers"
    }

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("id", "BIGSERIAL"),
            Column::new("name", "TEXT"),
            Column::new("is_deleted", "BOOLEAN"),
            Column::new("created_at", "TIMESTAMPTZ"),
            Column::new("updated_at", "TIMESTAMPTZ"),
        ];
        COLUMNS
    }

    fn capabilities() -> Capabilities {
        Capabilities::none()
            .soft_delete::<Self>()
            .time_tracking::<Self>()
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn as_soft_deletable(&mut self) -> Option<&mut dyn SoftDeletable> {
        Some(self)
    }

    fn as_time_tracked(&mut self) -> Option<&mut dyn TimeTracked> {
        Some(self)
    }
}

/// Plain entity with a foreign key to [`Lecturer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: EntityId,
    pub title: String,
    pub lecturer_id: EntityId,
}

impl Entity for Lecture {
    fn table_name() -> &'static str {
        "lectures"
    }

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("id", "BIGSERIAL"),
            Column::new("title", "TEXT"),
            Column::new("lecturer_id", "BIGINT").references("lecturers"),
        ];
        COLUMNS
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

/// No capabilities, nullable column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub id: EntityId,
    pub text: Option<String>,
}

impl Entity for Memo {
    fn table_name() -> &'static str {
        "memos"
    }

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("id", "BIGSERIAL"),
            Column::new("text", "TEXT").nullable(),
        ];
        COLUMNS
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

/// Claims soft delete but never stores the flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unflagged {
    pub id: EntityId,
    #[serde(skip)]
    pub removed: bool,
}

impl SoftDeletable for Unflagged {
    fn is_removed(&self) -> bool {
        self.removed
    }

    fn set_removed(&mut self, removed: bool) {
        self.removed = removed;
    }
}

impl Entity for Unflagged {
    fn table_name() -> &'static str {
        "unflagged"
    }

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[Column::new("id", "BIGSERIAL")];
        COLUMNS
    }

    fn capabilities() -> Capabilities {
        Capabilities::none().soft_delete::<Self>()
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn as_soft_deletable(&mut self) -> Option<&mut dyn SoftDeletable> {
        Some(self)
    }
}
