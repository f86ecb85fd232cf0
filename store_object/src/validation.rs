//! Identifier validation
//!
//! Table and column names are interpolated into generated SQL, so every name
//! that reaches the model registry goes through these checks first.

use std::fmt;
use thiserror::Error;

/// PostgreSQL truncates identifiers past this many bytes
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Words PostgreSQL refuses as bare table or column names
const RESERVED_KEYWORDS: &[&str] = &[
    "ALL", "ANALYSE", "ANALYZE", "AND", "ANY", "ARRAY", "AS", "ASC", "ASYMMETRIC", "BOTH",
    "CASE", "CAST", "CHECK", "COLLATE", "COLUMN", "CONSTRAINT", "CREATE", "CURRENT_DATE",
    "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "DEFAULT", "DEFERRABLE", "DESC",
    "DISTINCT", "DO", "ELSE", "END", "EXCEPT", "FALSE", "FETCH", "FOR", "FOREIGN", "FROM",
    "GRANT", "GROUP", "HAVING", "IN", "INITIALLY", "INTERSECT", "INTO", "LATERAL", "LEADING",
    "LIMIT", "LOCALTIME", "LOCALTIMESTAMP", "NOT", "NULL", "OFFSET", "ON", "ONLY", "OR",
    "ORDER", "PLACING", "PRIMARY", "REFERENCES", "RETURNING", "SELECT", "SESSION_USER", "SOME",
    "SYMMETRIC", "TABLE", "THEN", "TO", "TRAILING", "TRUE", "UNION", "UNIQUE", "USER", "USING",
    "VARIADIC", "WHEN", "WHERE", "WINDOW", "WITH",
];

/// What an identifier names, for error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Table => write!(f, "table"),
            IdentifierKind::Column => write!(f, "column"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} name cannot be empty")]
    Empty { kind: IdentifierKind },

    #[error("{kind} name '{name}' is {length} bytes long (max {max})")]
    TooLong {
        kind: IdentifierKind,
        name: String,
        length: usize,
        max: usize,
    },

    #[error("{kind} name '{name}' must start with a letter or underscore")]
    InvalidStart { kind: IdentifierKind, name: String },

    #[error("{kind} name '{name}' may only hold ASCII letters, digits and underscores")]
    InvalidCharacters { kind: IdentifierKind, name: String },

    #[error("{kind} name '{name}' is a reserved SQL keyword")]
    Reserved { kind: IdentifierKind, name: String },
}

impl ValidationError {
    pub fn kind(&self) -> IdentifierKind {
        match self {
            ValidationError::Empty { kind }
            | ValidationError::TooLong { kind, .. }
            | ValidationError::InvalidStart { kind, .. }
            | ValidationError::InvalidCharacters { kind, .. }
            | ValidationError::Reserved { kind, .. } => *kind,
        }
    }
}

/// Check `name` as a bare PostgreSQL identifier
pub fn check_identifier(name: &str, kind: IdentifierKind) -> Result<(), ValidationError> {
    let Some(first) = name.chars().next() else {
        return Err(ValidationError::Empty { kind });
    };
    let owned = || name.to_string();

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            kind,
            name: owned(),
            length: name.len(),
            max: MAX_IDENTIFIER_LENGTH,
        });
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(ValidationError::InvalidStart { kind, name: owned() });
    }
    if name.chars().any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
        return Err(ValidationError::InvalidCharacters { kind, name: owned() });
    }
    if RESERVED_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(name))
    {
        return Err(ValidationError::Reserved { kind, name: owned() });
    }
    Ok(())
}

/// A table name that passed [`check_identifier`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedTableName(String);

impl ValidatedTableName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        check_identifier(name, IdentifierKind::Table)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A column name that passed [`check_identifier`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedFieldName(String);

impl ValidatedFieldName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        check_identifier(name, IdentifierKind::Column)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedFieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_university_identifiers() {
        let longest = "t".repeat(MAX_IDENTIFIER_LENGTH);
        for name in [
            "students",
            "student_addresses",
            "courses_students",
            "CoursesStudents",
            "_staging",
            "notes2",
            longest.as_str(),
        ] {
            assert!(ValidatedTableName::new(name).is_ok(), "rejected {}", name);
        }
        for name in ["id", "is_deleted", "created_at", "updated_at", "student_id"] {
            assert!(ValidatedFieldName::new(name).is_ok(), "rejected {}", name);
        }
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let table = IdentifierKind::Table;
        let cases = [
            ("", ValidationError::Empty { kind: table }),
            (
                "2students",
                ValidationError::InvalidStart { kind: table, name: "2students".into() },
            ),
            (
                "student-notes",
                ValidationError::InvalidCharacters { kind: table, name: "student-notes".into() },
            ),
            (
                "students; DROP TABLE notes",
                ValidationError::InvalidCharacters {
                    kind: table,
                    name: "students; DROP TABLE notes".into(),
                },
            ),
            ("Select", ValidationError::Reserved { kind: table, name: "Select".into() }),
            ("user", ValidationError::Reserved { kind: table, name: "user".into() }),
        ];

        for (name, expected) in cases {
            assert_eq!(ValidatedTableName::new(name).unwrap_err(), expected, "name: {:?}", name);
        }
    }

    #[test]
    fn overlong_column_reports_its_length() {
        let name = "c".repeat(MAX_IDENTIFIER_LENGTH + 1);

        let err = ValidatedFieldName::new(&name).unwrap_err();

        assert_eq!(err.kind(), IdentifierKind::Column);
        assert!(matches!(err, ValidationError::TooLong { length: 64, max: 63, .. }));
        assert!(err.to_string().starts_with("column name"));
    }

    #[test]
    fn validated_names_display_unchanged() {
        assert_eq!(ValidatedTableName::new("notes").unwrap().to_string(), "notes");
        assert_eq!(ValidatedFieldName::new("text").unwrap().as_str(), "text");
    }
}
