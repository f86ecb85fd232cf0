use crate::validation::ValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Model setup is inconsistent; raised while registering entity types
    #[error("Configuration error for '{table}': {message}")]
    Configuration { table: String, message: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] ValidationError),

    #[error("Database error in {table}.{operation}: {source}")]
    Database {
        table: String,
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Constraint violation on '{table}': {message}")]
    Constraint { table: String, message: String },

    /// Update or delete targeted a row that no longer exists
    #[error("Row {key} in '{table}' was not found while saving changes")]
    Concurrency { table: String, key: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage failure outside of SQL, e.g. a missing in-memory table
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Serialization error for '{table}': {source}")]
    Serialization {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Entity type '{0}' is not registered in the model")]
    UnknownEntity(String),

    #[error("Column '{column}' does not exist in '{table}'")]
    UnknownColumn { table: String, column: String },

    /// The same (table, key) is already tracked by the unit of work
    #[error("Row {key} of '{table}' is already tracked")]
    AlreadyTracked { table: String, key: i64 },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl StoreError {
    pub fn configuration(table: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            table: table.to_string(),
            message: message.into(),
        }
    }

    pub fn database_operation(table: &str, operation: &str, source: sqlx::Error) -> Self {
        Self::Database {
            table: table.to_string(),
            operation: operation.to_string(),
            source,
        }
    }

    pub fn constraint(table: &str, message: impl Into<String>) -> Self {
        Self::Constraint {
            table: table.to_string(),
            message: message.into(),
        }
    }

    pub fn serialization(table: &str, source: serde_json::Error) -> Self {
        Self::Serialization {
            table: table.to_string(),
            source,
        }
    }

    /// Whether this error came from the model setup rather than the engine
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StoreError::Configuration { .. } | StoreError::InvalidIdentifier(_)
        )
    }
}
