//! University records
//!
//! `Student` is the only soft-deletable, time-tracked type. Addresses, notes
//! and enrollments point at students by key; enrollments also point at
//! courses, forming the many-to-many link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use store_object::{Capabilities, Column, Entity, EntityId, SoftDeletable, TimeTracked};

/// Longest student name the schema accepts
pub const STUDENT_NAME_MAX_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: EntityId,
    pub name: String,
    pub age: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn new(name: impl Into<String>, age: i32) -> Self {
        Self {
            id: 0,
            name: name.into(),
            age,
            is_deleted: false,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }
}

impl SoftDeletable for Student {
    fn is_removed(&self) -> bool {
        self.is_deleted
    }

    fn set_removed(&mut self, removed: bool) {
        self.is_deleted = removed;
    }
}

impl TimeTracked for Student {
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

impl Entity for Student {
    fn table_name() -> &'static str {
        "students"
    }

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("id", "BIGSERIAL"),
            Column::new("name", "VARCHAR(100)"),
            Column::new("age", "INTEGER"),
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

/// One-to-one with [`Student`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAddress {
    pub id: EntityId,
    pub address: String,
    pub student_id: EntityId,
}

impl StudentAddress {
    pub fn new(student_id: EntityId, address: impl Into<String>) -> Self {
        Self {
            id: 0,
            address: address.into(),
            student_id,
        }
    }
}

impl Entity for StudentAddress {
    fn table_name() -> &'static str {
        "student_addresses"
    }

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("id", "BIGSERIAL"),
            Column::new("address", "TEXT"),
            Column::new("student_id", "BIGINT").references("students"),
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: EntityId,
    pub text: Option<String>,
    pub student_id: EntityId,
}

impl Note {
    pub fn new(student_id: EntityId, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            text: Some(text.into()),
            student_id,
        }
    }
}

impl Entity for Note {
    fn table_name() -> &'static str {
        "notes"
    }

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("id", "BIGSERIAL"),
            Column::new("text", "TEXT").nullable(),
            Column::new("student_id", "BIGINT").references("students"),
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: EntityId,
    pub name: String,
}

impl Course {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
        }
    }
}

impl Entity for Course {
    fn table_name() -> &'static str {
        "courses"
    }

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("id", "BIGSERIAL"),
            Column::new("name", "TEXT"),
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

/// Link row of the student/course many-to-many relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EntityId,
    pub student_id: EntityId,
    pub course_id: EntityId,
}

impl Enrollment {
    pub fn new(student_id: EntityId, course_id: EntityId) -> Self {
        Self {
            id: 0,
            student_id,
            course_id,
        }
    }
}

impl Entity for Enrollment {
    fn table_name() -> &'static str {
        "courses_students"
    }

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("id", "BIGSERIAL"),
            Column::new("student_id", "BIGINT").references("students"),
            Column::new("course_id", "BIGINT").references("courses"),
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

/// Row of the student/course listing; `course` is empty for students
/// without enrollments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentCourse {
    pub student: String,
    pub course: Option<String>,
}

impl std::fmt::Display for StudentCourse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.course {
            Some(course) => write!(f, "{} -> {}", self.student, course),
            None => write!(f, "{} -> (no course)", self.student),
        }
    }
}
