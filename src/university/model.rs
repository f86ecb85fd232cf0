//! University model registration and save rules

use chrono::{DateTime, Utc};
use store_object::{EntityState, ModelRegistry, SaveInterceptor, StoreError, TrackedEntry};
use tracing::info;

use super::entities::{Course, Enrollment, Note, Student, StudentAddress, STUDENT_NAME_MAX_LEN};

/// Registry of every university table, foreign key targets first
pub fn model() -> Result<ModelRegistry, StoreError> {
    let mut registry = ModelRegistry::new();
    registry
        .register::<Student>()?
        .register::<Course>()?
        .register::<StudentAddress>()?
        .register::<Note>()?
        .register::<Enrollment>()?;

    info!(tables = registry.len(), "University model registered");
    Ok(registry)
}

/// Rejects student names longer than the column allows
///
/// Runs after the audit interceptor, so it sees the final pending state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StudentNameRule;

impl SaveInterceptor for StudentNameRule {
    fn name(&self) -> &'static str {
        "student-name"
    }

    fn saving_changes(&self, entries: &mut [TrackedEntry], _now: DateTime<Utc>) -> Result<(), StoreError> {
        for entry in entries.iter() {
            if !matches!(entry.state(), EntityState::Added | EntityState::Modified) {
                continue;
            }
            let Some(student) = entry.downcast::<Student>() else {
                continue;
            };
            let len = student.name.chars().count();
            if len > STUDENT_NAME_MAX_LEN {
                return Err(StoreError::constraint(
                    "students",
                    format!(
                        "name has {} characters, at most {} allowed",
                        len, STUDENT_NAME_MAX_LEN
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_object::SoftDeletable;

    #[test]
    fn tables_are_registered_in_dependency_order() {
        let registry = model().unwrap();
        let tables: Vec<&str> = registry.models().map(|m| m.table()).collect();

        assert_eq!(
            tables,
            vec!["students", "courses", "student_addresses", "notes", "courses_students"]
        );
        assert_eq!(registry.soft_delete_columns(), vec![("students", "is_deleted")]);
        assert_eq!(registry.model("students").unwrap().implicit_filters().len(), 1);
        assert!(registry.model("courses").unwrap().implicit_filters().is_empty());
    }

    #[test]
    fn student_is_the_only_soft_deletable_type() {
        let registry = model().unwrap();
        let soft: Vec<&str> = registry
            .models()
            .filter(|m| m.capabilities().is_soft_deletable())
            .map(|m| m.table())
            .collect();
        assert_eq!(soft, vec!["students"]);

        let mut student = Student::new("John", 20);
        student.set_removed(true);
        assert!(student.is_deleted);
    }
}
