//! Persistence engine interface
//!
//! The unit of work never talks to storage directly. Commits, reads and bulk
//! statements are handed to a [`PersistenceEngine`], which owns connection
//! handling, SQL and atomicity.

use crate::errors::StoreError;
use crate::query_builder::{QueryBuilder, UpdateSet};
use crate::traits::entity::{EntityId, TableSchema};
use async_trait::async_trait;
use config::DbProvider;
use serde_json::Value;
use std::fmt::Debug;

/// One serialized write inside a commit batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a row; the engine assigns the key when the row carries `0`
    Insert { schema: TableSchema, row: Value },
    /// Overwrite all data columns of an existing row
    Update {
        schema: TableSchema,
        key: EntityId,
        row: Value,
    },
    /// Physically remove a row
    Delete { schema: TableSchema, key: EntityId },
}

impl WriteOp {
    pub fn schema(&self) -> &TableSchema {
        match self {
            WriteOp::Insert { schema, .. }
            | WriteOp::Update { schema, .. }
            | WriteOp::Delete { schema, .. } => schema,
        }
    }

    pub fn table(&self) -> &'static str {
        self.schema().name
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Insert { .. } => "insert",
            WriteOp::Update { .. } => "update",
            WriteOp::Delete { .. } => "delete",
        }
    }
}

/// Save/query primitives of the underlying storage
#[async_trait]
pub trait PersistenceEngine: Send + Sync + Debug {
    /// Which provider this engine talks to
    fn provider(&self) -> DbProvider;

    /// Create the table if it does not exist yet
    async fn ensure_table(&self, schema: &TableSchema) -> Result<(), StoreError>;

    /// Drop the table if it exists
    async fn drop_table(&self, table: &str) -> Result<(), StoreError>;

    /// Create a single-column index if it does not exist yet
    async fn create_index(&self, table: &str, column: &str) -> Result<(), StoreError>;

    /// Apply a batch atomically
    ///
    /// Returns one entry per operation: the key of inserted rows, `None` for
    /// updates and deletes. On error nothing from the batch is persisted.
    async fn commit(&self, batch: &[WriteOp]) -> Result<Vec<Option<EntityId>>, StoreError>;

    /// Fetch rows matching the query, as JSON objects keyed by column
    async fn fetch(&self, schema: &TableSchema, query: &QueryBuilder) -> Result<Vec<Value>, StoreError>;

    /// Count rows matching the query
    async fn count(&self, schema: &TableSchema, query: &QueryBuilder) -> Result<i64, StoreError>;

    /// Apply column updates to all rows matching the query
    async fn update_where(
        &self,
        schema: &TableSchema,
        updates: &UpdateSet,
        query: &QueryBuilder,
    ) -> Result<u64, StoreError>;

    /// Physically remove all rows matching the query
    async fn delete_where(&self, schema: &TableSchema, query: &QueryBuilder) -> Result<u64, StoreError>;

    /// Statement a raw read would run: the caller's SELECT, numbered `$1..`
    /// for `param_count` parameters, wrapped with the query's conditions
    fn raw_query_string(
        &self,
        _schema: &TableSchema,
        _sql: &str,
        _param_count: usize,
        _query: &QueryBuilder,
    ) -> Result<String, StoreError> {
        Err(StoreError::Unsupported(format!(
            "raw SQL on the {} provider",
            self.provider()
        )))
    }

    /// Run a caller-written SELECT returning rows of `schema`, with the
    /// query's conditions applied on top of it
    async fn fetch_raw(
        &self,
        _schema: &TableSchema,
        _sql: &str,
        _params: &[Value],
        _query: &QueryBuilder,
    ) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::Unsupported(format!(
            "raw SQL on the {} provider",
            self.provider()
        )))
    }
}
