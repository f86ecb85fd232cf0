//! In-process engine
//!
//! Tables of JSON rows behind a lock. A commit works on a copy of all tables
//! and swaps it in only when every operation succeeded, so a failing batch
//! leaves nothing behind. Foreign keys and NOT NULL columns are enforced like
//! PostgreSQL would.

use crate::errors::StoreError;
use crate::query_builder::evaluate::{apply_query, matches_query};
use crate::query_builder::{QueryBuilder, UpdateSet};
use crate::traits::{EntityId, PersistenceEngine, TableSchema, WriteOp};
use async_trait::async_trait;
use config::DbProvider;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: TableSchema,
    rows: BTreeMap<EntityId, Value>,
    next_key: EntityId,
    indexes: BTreeSet<String>,
}

impl MemoryTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_key: 1,
            indexes: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables(BTreeMap<String, MemoryTable>);

impl Tables {
    fn table(&self, name: &str) -> Result<&MemoryTable, StoreError> {
        self.0
            .get(name)
            .ok_or_else(|| StoreError::Engine(format!("table '{}' does not exist", name)))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, StoreError> {
        self.0
            .get_mut(name)
            .ok_or_else(|| StoreError::Engine(format!("table '{}' does not exist", name)))
    }

    /// Keep only schema columns, in schema order, with missing ones as NULL
    fn normalize(schema: &TableSchema, row: &Value, key: EntityId) -> Result<Value, StoreError> {
        let source = row.as_object().ok_or_else(|| {
            StoreError::Engine(format!("row for '{}' is not a JSON object", schema.name))
        })?;

        let mut normalized = Map::new();
        for column in schema.columns {
            let value = if column.name == schema.primary_key {
                Value::from(key)
            } else {
                source.get(column.name).cloned().unwrap_or(Value::Null)
            };
            normalized.insert(column.name.to_string(), value);
        }
        Ok(Value::Object(normalized))
    }

    fn check_row(&self, schema: &TableSchema, row: &Value) -> Result<(), StoreError> {
        for column in schema.data_columns() {
            let value = row.get(column.name).unwrap_or(&Value::Null);

            if value.is_null() {
                if !column.nullable {
                    return Err(StoreError::constraint(
                        schema.name,
                        format!("null value in column '{}' violates not-null constraint", column.name),
                    ));
                }
                continue;
            }

            if let Some(target) = column.references {
                let exists = value
                    .as_i64()
                    .map(|key| self.table(target).map(|t| t.rows.contains_key(&key)))
                    .transpose()?
                    .unwrap_or(false);
                if !exists {
                    return Err(StoreError::constraint(
                        schema.name,
                        format!(
                            "column '{}' references missing row {} in '{}'",
                            column.name, value, target
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Refuse to remove a row that is still referenced
    fn check_unreferenced(&self, table: &str, key: EntityId) -> Result<(), StoreError> {
        for other in self.0.values() {
            for column in other.schema.columns {
                if column.references != Some(table) {
                    continue;
                }
                let referenced = other
                    .rows
                    .values()
                    .any(|row| row.get(column.name).and_then(Value::as_i64) == Some(key));
                if referenced {
                    return Err(StoreError::constraint(
                        table,
                        format!(
                            "row {} is still referenced from '{}.{}'",
                            key, other.schema.name, column.name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, table: &str, row: &Value) -> Result<EntityId, StoreError> {
        let (schema, key) = {
            let target = self.table(table)?;
            let requested = row
                .get(target.schema.primary_key)
                .and_then(Value::as_i64)
                .unwrap_or(0);
            if requested != 0 && target.rows.contains_key(&requested) {
                return Err(StoreError::constraint(
                    table,
                    format!("duplicate key value {}", requested),
                ));
            }
            let key = if requested == 0 { target.next_key } else { requested };
            (target.schema, key)
        };

        let normalized = Self::normalize(&schema, row, key)?;
        self.check_row(&schema, &normalized)?;

        let target = self.table_mut(table)?;
        target.next_key = target.next_key.max(key + 1);
        target.rows.insert(key, normalized);
        Ok(key)
    }

    fn update(&mut self, table: &str, key: EntityId, row: &Value) -> Result<(), StoreError> {
        let schema = self.table(table)?.schema;
        if !self.table(table)?.rows.contains_key(&key) {
            return Err(StoreError::Concurrency {
                table: table.to_string(),
                key,
            });
        }

        let normalized = Self::normalize(&schema, row, key)?;
        self.check_row(&schema, &normalized)?;
        self.table_mut(table)?.rows.insert(key, normalized);
        Ok(())
    }

    fn delete(&mut self, table: &str, key: EntityId) -> Result<(), StoreError> {
        if !self.table(table)?.rows.contains_key(&key) {
            return Err(StoreError::Concurrency {
                table: table.to_string(),
                key,
            });
        }
        self.check_unreferenced(table, key)?;
        self.table_mut(table)?.rows.remove(&key);
        Ok(())
    }

    fn matching_keys(&self, table: &str, query: &QueryBuilder) -> Result<Vec<EntityId>, StoreError> {
        Ok(self
            .table(table)?
            .rows
            .iter()
            .filter(|(_, row)| matches_query(query, row))
            .map(|(key, _)| *key)
            .collect())
    }
}

/// Engine keeping all tables in process memory
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: RwLock<Tables>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Engine("memory engine lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Engine("memory engine lock poisoned".to_string()))
    }

    /// Names of the indexes created on a table
    pub fn indexes(&self, table: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.read()?.table(table)?.indexes.iter().cloned().collect())
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.read().map(|tables| tables.0.contains_key(table)).unwrap_or(false)
    }
}

#[async_trait]
impl PersistenceEngine for MemoryEngine {
    fn provider(&self) -> DbProvider {
        DbProvider::Memory
    }

    async fn ensure_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        for column in schema.columns {
            if let Some(target) = column.references {
                if target != schema.name && !tables.0.contains_key(target) {
                    return Err(StoreError::Engine(format!(
                        "table '{}' references missing table '{}'",
                        schema.name, target
                    )));
                }
            }
        }
        tables
            .0
            .entry(schema.name.to_string())
            .or_insert_with(|| MemoryTable::new(*schema));
        debug_log!("[MEMORY] ensured table {}", schema.name);
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let referenced_by = tables.0.values().find(|other| {
            other.schema.name != table
                && other
                    .schema
                    .columns
                    .iter()
                    .any(|column| column.references == Some(table))
        });
        if let Some(other) = referenced_by {
            return Err(StoreError::constraint(
                table,
                format!("table '{}' depends on it", other.schema.name),
            ));
        }
        tables.0.remove(table);
        Ok(())
    }

    async fn create_index(&self, table: &str, column: &str) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let target = tables.table_mut(table)?;
        if !target.schema.has_column(column) {
            return Err(StoreError::Engine(format!(
                "column '{}' does not exist in '{}'",
                column, table
            )));
        }
        target.indexes.insert(format!("ix_{}_{}", table, column));
        Ok(())
    }

    async fn commit(&self, batch: &[WriteOp]) -> Result<Vec<Option<EntityId>>, StoreError> {
        let mut tables = self.write()?;
        let mut working = tables.clone();
        let mut keys = Vec::with_capacity(batch.len());

        for op in batch {
            trace_log!("[MEMORY] {} on {}", op.kind(), op.table());
            let key = match op {
                WriteOp::Insert { schema, row } => Some(working.insert(schema.name, row)?),
                WriteOp::Update { schema, key, row } => {
                    working.update(schema.name, *key, row)?;
                    None
                }
                WriteOp::Delete { schema, key } => {
                    working.delete(schema.name, *key)?;
                    None
                }
            };
            keys.push(key);
        }

        *tables = working;
        Ok(keys)
    }

    async fn fetch(&self, schema: &TableSchema, query: &QueryBuilder) -> Result<Vec<Value>, StoreError> {
        let tables = self.read()?;
        let rows = tables.table(schema.name)?.rows.values().cloned();
        Ok(apply_query(rows, query))
    }

    async fn count(&self, schema: &TableSchema, query: &QueryBuilder) -> Result<i64, StoreError> {
        let tables = self.read()?;
        Ok(tables.matching_keys(schema.name, query)?.len() as i64)
    }

    async fn update_where(
        &self,
        target: &TableSchema,
        updates: &UpdateSet,
        query: &QueryBuilder,
    ) -> Result<u64, StoreError> {
        let table = target.name;
        let mut tables = self.write()?;
        let mut working = tables.clone();
        let schema = working.table(table)?.schema;

        for field in updates.fields() {
            if field == schema.primary_key || !schema.has_column(field) {
                return Err(StoreError::Engine(format!(
                    "column '{}' cannot be updated in '{}'",
                    field, table
                )));
            }
        }

        let keys = working.matching_keys(table, query)?;
        for key in &keys {
            let mut row = working.table(table)?.rows.get(key).cloned().unwrap_or(Value::Null);
            for (field, operation) in updates.iter() {
                let current = row.get(field.as_str()).cloned().unwrap_or(Value::Null);
                let next = operation.apply(&current).ok_or_else(|| {
                    StoreError::constraint(
                        table,
                        format!("cannot apply arithmetic to column '{}' value {}", field, current),
                    )
                })?;
                if let Some(object) = row.as_object_mut() {
                    object.insert(field.clone(), next);
                }
            }
            working.update(table, *key, &row)?;
        }

        *tables = working;
        Ok(keys.len() as u64)
    }

    async fn delete_where(&self, schema: &TableSchema, query: &QueryBuilder) -> Result<u64, StoreError> {
        let table = schema.name;
        let mut tables = self.write()?;
        let mut working = tables.clone();

        let keys = working.matching_keys(table, query)?;
        for key in &keys {
            working.delete(table, *key)?;
        }

        *tables = working;
        Ok(keys.len() as u64)
    }
}
