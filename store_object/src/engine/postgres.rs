//! PostgreSQL engine
//!
//! Rows cross the boundary as JSONB: writes go through
//! `jsonb_populate_record`, reads come back through `row_to_json`, so one
//! code path serves every entity type. Filter values are bound as
//! parameters, never inlined, typed after the column they meet.

use crate::errors::StoreError;
use crate::query_builder::{BoundValue, QueryBuilder, SqlGenerator, UpdateSet};
use crate::traits::{EntityId, PersistenceEngine, TableSchema, WriteOp};
use crate::validation::{ValidatedFieldName, ValidatedTableName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::{DatabaseConfig, DbProvider};
use serde_json::{Number, Value};
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::time::Duration;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// PostgreSQL type a bound value is sent as, taken from the column it meets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Timestamp,
    Int4,
    Int8,
    Float8,
    Bool,
    Text,
    /// No column to go by (raw SQL parameters, unknown columns)
    Untyped,
}

impl ParamKind {
    fn of_sql_type(sql_type: &str) -> Self {
        let upper = sql_type.trim().to_ascii_uppercase();
        if upper.starts_with("TIMESTAMP") {
            return ParamKind::Timestamp;
        }

        let base = upper.split('(').next().unwrap_or_default().trim();
        match base {
            "SMALLINT" | "INTEGER" | "INT" | "INT2" | "INT4" | "SERIAL" => ParamKind::Int4,
            "BIGINT" | "INT8" | "BIGSERIAL" => ParamKind::Int8,
            "REAL" | "FLOAT4" | "FLOAT8" | "DOUBLE PRECISION" | "NUMERIC" | "DECIMAL" => {
                ParamKind::Float8
            }
            "BOOLEAN" | "BOOL" => ParamKind::Bool,
            "TEXT" | "VARCHAR" | "CHARACTER VARYING" | "CHAR" | "CHARACTER" => ParamKind::Text,
            _ => ParamKind::Untyped,
        }
    }

    fn for_column(schema: &TableSchema, column: &str) -> Self {
        schema
            .column(column)
            .map_or(ParamKind::Untyped, |column| Self::of_sql_type(column.sql_type))
    }
}

/// A JSON value converted to the Rust type it is bound as
#[derive(Debug, Clone, PartialEq)]
enum PgParam {
    Timestamp(DateTime<Utc>),
    Int4(i32),
    Int8(i64),
    Float8(f64),
    Bool(bool),
    Text(String),
    Json(Value),
    Null(ParamKind),
}

impl PgParam {
    fn new(value: Value, kind: ParamKind) -> Self {
        match value {
            Value::Null => PgParam::Null(kind),
            Value::Bool(flag) => PgParam::Bool(flag),
            // Only timestamp columns read RFC 3339 text as an instant
            Value::String(text) => match kind {
                ParamKind::Timestamp => match DateTime::parse_from_rfc3339(&text) {
                    Ok(at) => PgParam::Timestamp(at.with_timezone(&Utc)),
                    Err(_) => PgParam::Text(text),
                },
                _ => PgParam::Text(text),
            },
            Value::Number(number) => match kind {
                ParamKind::Text => PgParam::Text(number.to_string()),
                ParamKind::Float8 => number
                    .as_f64()
                    .map_or_else(|| PgParam::Text(number.to_string()), PgParam::Float8),
                ParamKind::Int4 => match number.as_i64().and_then(|i| i32::try_from(i).ok()) {
                    Some(small) => PgParam::Int4(small),
                    None => Self::number(&number),
                },
                _ => Self::number(&number),
            },
            other => PgParam::Json(other),
        }
    }

    fn number(number: &Number) -> Self {
        if let Some(whole) = number.as_i64() {
            PgParam::Int8(whole)
        } else if let Some(fraction) = number.as_f64() {
            PgParam::Float8(fraction)
        } else {
            PgParam::Text(number.to_string())
        }
    }

    fn bind(self, query: PgQuery<'_>) -> PgQuery<'_> {
        match self {
            PgParam::Timestamp(at) => query.bind(at),
            PgParam::Int4(value) => query.bind(value),
            PgParam::Int8(value) => query.bind(value),
            PgParam::Float8(value) => query.bind(value),
            PgParam::Bool(value) => query.bind(value),
            PgParam::Text(value) => query.bind(value),
            PgParam::Json(value) => query.bind(value),
            PgParam::Null(kind) => match kind {
                ParamKind::Timestamp => query.bind(Option::<DateTime<Utc>>::None),
                ParamKind::Int4 => query.bind(Option::<i32>::None),
                ParamKind::Int8 => query.bind(Option::<i64>::None),
                ParamKind::Float8 => query.bind(Option::<f64>::None),
                ParamKind::Bool => query.bind(Option::<bool>::None),
                ParamKind::Text | ParamKind::Untyped => query.bind(Option::<String>::None),
            },
        }
    }
}

fn bind_columns<'q>(mut query: PgQuery<'q>, schema: &TableSchema, params: Vec<BoundValue>) -> PgQuery<'q> {
    for param in params {
        let kind = ParamKind::for_column(schema, &param.column);
        query = PgParam::new(param.value, kind).bind(query);
    }
    query
}

/// Join the non-empty parts of a statement
fn statement(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map driver errors, separating constraint violations from the rest
fn map_sqlx_error(table: &str, operation: &str, error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_error) = &error {
        match db_error.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => {
                return StoreError::constraint(table, db_error.message());
            }
            _ => {}
        }
    }
    StoreError::database_operation(table, operation, error)
}

/// Engine backed by a sqlx PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgEngine {
    pool: PgPool,
}

impl PgEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from the database configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let connection_string = config.connection_string();

        let mut pool_options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

        // Set max lifetime if specified
        if config.max_lifetime_seconds > 0 {
            pool_options =
                pool_options.max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
        }

        let pool = pool_options
            .connect(&connection_string)
            .await
            .map_err(|e| StoreError::database_operation(&config.database, "connect", e))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// CREATE TABLE statement for a schema
    pub fn create_table_sql(schema: &TableSchema) -> Result<String, StoreError> {
        let table = ValidatedTableName::new(schema.name)?;

        let mut definitions = Vec::with_capacity(schema.columns.len());
        for column in schema.columns {
            let name = ValidatedFieldName::new(column.name)?;
            let definition = if column.name == schema.primary_key {
                format!("{} BIGSERIAL PRIMARY KEY", name)
            } else {
                let mut definition = format!("{} {}", name, column.sql_type);
                if !column.nullable {
                    definition.push_str(" NOT NULL");
                }
                if let Some(target) = column.references {
                    let target = ValidatedTableName::new(target)?;
                    definition.push_str(&format!(" REFERENCES {}", target));
                }
                definition
            };
            definitions.push(definition);
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            table,
            definitions.join(", ")
        ))
    }

    /// INSERT from a JSONB row; the key is generated unless the row carries one
    pub fn insert_sql(schema: &TableSchema, row: &Value) -> String {
        let explicit_key = row
            .get(schema.primary_key)
            .and_then(Value::as_i64)
            .is_some_and(|key| key != 0);

        let columns: Vec<&str> = schema
            .columns
            .iter()
            .map(|column| column.name)
            .filter(|name| explicit_key || *name != schema.primary_key)
            .collect();
        let columns = columns.join(", ");

        format!(
            "INSERT INTO {table} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) RETURNING {pk}",
            table = schema.name,
            columns = columns,
            pk = schema.primary_key
        )
    }

    /// UPDATE of all data columns from a JSONB row
    pub fn update_sql(schema: &TableSchema) -> String {
        let columns: Vec<&str> = schema.data_columns().map(|column| column.name).collect();
        let columns = columns.join(", ");

        format!(
            "UPDATE {table} SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)) WHERE {pk} = $2",
            table = schema.name,
            columns = columns,
            pk = schema.primary_key
        )
    }

    pub fn delete_sql(schema: &TableSchema) -> String {
        format!(
            "DELETE FROM {} WHERE {} = $1",
            schema.name, schema.primary_key
        )
    }

    /// SELECT of matching rows as JSONB, with its bound values
    pub fn select_sql(
        schema: &TableSchema,
        query: &QueryBuilder,
    ) -> Result<(String, Vec<BoundValue>), StoreError> {
        let table = ValidatedTableName::new(schema.name)?;
        let from = format!("FROM {} t", table);
        Ok(Self::select_rows(&from, 1, query))
    }

    /// SELECT over a caller-written query, its parameters numbered first
    pub fn raw_select_sql(raw: &str, param_count: usize, query: &QueryBuilder) -> (String, Vec<BoundValue>) {
        let from = format!("FROM ({}) t", raw);
        Self::select_rows(&from, param_count + 1, query)
    }

    fn select_rows(from: &str, first_param: usize, query: &QueryBuilder) -> (String, Vec<BoundValue>) {
        let (where_clause, bound) =
            SqlGenerator::build_where_clause_bound(query.conditions(), first_param);
        let order_clause = SqlGenerator::build_order_clause(query.ordering());
        let limit_clause = SqlGenerator::build_limit_clause(query.limit_value(), query.offset_value());

        let sql = statement(&[
            "SELECT row_to_json(t)::jsonb AS row",
            from,
            &where_clause,
            &order_clause,
            &limit_clause,
        ]);
        (sql, bound)
    }

    pub fn count_sql(
        schema: &TableSchema,
        query: &QueryBuilder,
    ) -> Result<(String, Vec<BoundValue>), StoreError> {
        let table = ValidatedTableName::new(schema.name)?;
        // No ORDER BY or LIMIT for COUNT
        let (where_clause, bound) = SqlGenerator::build_where_clause_bound(query.conditions(), 1);
        let from = format!("FROM {}", table);
        Ok((
            statement(&["SELECT COUNT(*) AS total", &from, &where_clause]),
            bound,
        ))
    }

    /// Bulk UPDATE; SET values come first, then the WHERE values
    pub fn update_where_sql(
        schema: &TableSchema,
        updates: &UpdateSet,
        query: &QueryBuilder,
    ) -> Result<(String, Vec<BoundValue>), StoreError> {
        let table = ValidatedTableName::new(schema.name)?;
        for field in updates.fields() {
            ValidatedFieldName::new(field)?;
        }

        let (set_clause, mut bound) = SqlGenerator::build_set_clause_bound(updates);
        let (where_clause, where_bound) =
            SqlGenerator::build_where_clause_bound(query.conditions(), bound.len() + 1);
        bound.extend(where_bound);

        let head = format!("UPDATE {} SET {}", table, set_clause);
        Ok((statement(&[&head, &where_clause]), bound))
    }

    pub fn delete_where_sql(
        schema: &TableSchema,
        query: &QueryBuilder,
    ) -> Result<(String, Vec<BoundValue>), StoreError> {
        let table = ValidatedTableName::new(schema.name)?;
        let (where_clause, bound) = SqlGenerator::build_where_clause_bound(query.conditions(), 1);
        let head = format!("DELETE FROM {}", table);
        Ok((statement(&[&head, &where_clause]), bound))
    }

    fn validated_table(table: &str) -> Result<ValidatedTableName, StoreError> {
        Ok(ValidatedTableName::new(table)?)
    }

    async fn execute(&self, table: &str, operation: &str, sql: &str) -> Result<u64, StoreError> {
        debug_log!("[{}] SQL: {}", operation, sql);
        let result = sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, operation, e))?;
        Ok(result.rows_affected())
    }

    async fn fetch_json(&self, table: &str, operation: &str, query: PgQuery<'_>) -> Result<Vec<Value>, StoreError> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, operation, e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<Value, _>("row")
                    .map_err(|e| StoreError::database_operation(table, "decode", e))
            })
            .collect()
    }
}

#[async_trait]
impl PersistenceEngine for PgEngine {
    fn provider(&self) -> DbProvider {
        DbProvider::Postgres
    }

    async fn ensure_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        let sql = Self::create_table_sql(schema)?;
        self.execute(schema.name, "create_table", &sql).await?;
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<(), StoreError> {
        let table = Self::validated_table(table)?;
        let sql = format!("DROP TABLE IF EXISTS {}", table);
        self.execute(table.as_str(), "drop_table", &sql).await?;
        Ok(())
    }

    async fn create_index(&self, table: &str, column: &str) -> Result<(), StoreError> {
        let table = Self::validated_table(table)?;
        let column = ValidatedFieldName::new(column)?;
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS ix_{table}_{column} ON {table} ({column})",
            table = table,
            column = column
        );
        self.execute(table.as_str(), "create_index", &sql).await?;
        Ok(())
    }

    async fn commit(&self, batch: &[WriteOp]) -> Result<Vec<Option<EntityId>>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::database_operation("*", "begin", e))?;
        let mut keys = Vec::with_capacity(batch.len());

        for op in batch {
            let schema = op.schema();
            match op {
                WriteOp::Insert { row, .. } => {
                    let sql = Self::insert_sql(schema, row);
                    trace_log!("[COMMIT] SQL: {}", sql);
                    let inserted = sqlx::query(&sql)
                        .bind(row.clone())
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error(schema.name, "insert", e))?;
                    let key: i64 = inserted
                        .try_get(schema.primary_key)
                        .map_err(|e| StoreError::database_operation(schema.name, "insert", e))?;
                    keys.push(Some(key));
                }
                WriteOp::Update { key, row, .. } => {
                    let sql = Self::update_sql(schema);
                    trace_log!("[COMMIT] SQL: {}", sql);
                    let result = sqlx::query(&sql)
                        .bind(row.clone())
                        .bind(*key)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error(schema.name, "update", e))?;
                    if result.rows_affected() == 0 {
                        return Err(StoreError::Concurrency {
                            table: schema.name.to_string(),
                            key: *key,
                        });
                    }
                    keys.push(None);
                }
                WriteOp::Delete { key, .. } => {
                    let sql = Self::delete_sql(schema);
                    trace_log!("[COMMIT] SQL: {}", sql);
                    let result = sqlx::query(&sql)
                        .bind(*key)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error(schema.name, "delete", e))?;
                    if result.rows_affected() == 0 {
                        return Err(StoreError::Concurrency {
                            table: schema.name.to_string(),
                            key: *key,
                        });
                    }
                    keys.push(None);
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::database_operation("*", "commit", e))?;
        Ok(keys)
    }

    async fn fetch(&self, schema: &TableSchema, query: &QueryBuilder) -> Result<Vec<Value>, StoreError> {
        let (sql, bound) = Self::select_sql(schema, query)?;
        debug_log!("[FETCH] SQL: {}", sql);

        let sqlx_query = bind_columns(sqlx::query(&sql), schema, bound);
        self.fetch_json(schema.name, "fetch", sqlx_query).await
    }

    async fn count(&self, schema: &TableSchema, query: &QueryBuilder) -> Result<i64, StoreError> {
        let (sql, bound) = Self::count_sql(schema, query)?;
        debug_log!("[COUNT] SQL: {}", sql);

        let result = bind_columns(sqlx::query(&sql), schema, bound)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(schema.name, "count", e))?;

        result
            .try_get::<i64, _>("total")
            .map_err(|e| StoreError::database_operation(schema.name, "count", e))
    }

    async fn update_where(
        &self,
        schema: &TableSchema,
        updates: &UpdateSet,
        query: &QueryBuilder,
    ) -> Result<u64, StoreError> {
        if updates.is_empty() {
            return Ok(0);
        }
        let (sql, bound) = Self::update_where_sql(schema, updates, query)?;
        debug_log!("[UPDATE_WHERE] SQL: {}", sql);
        debug_log!("[UPDATE_WHERE] params count: {}", bound.len());

        let result = bind_columns(sqlx::query(&sql), schema, bound)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(schema.name, "update_where", e))?;
        Ok(result.rows_affected())
    }

    async fn delete_where(&self, schema: &TableSchema, query: &QueryBuilder) -> Result<u64, StoreError> {
        let (sql, bound) = Self::delete_where_sql(schema, query)?;
        debug_log!("[DELETE_WHERE] SQL: {}", sql);

        let result = bind_columns(sqlx::query(&sql), schema, bound)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(schema.name, "delete_where", e))?;
        Ok(result.rows_affected())
    }

    fn raw_query_string(
        &self,
        _schema: &TableSchema,
        sql: &str,
        param_count: usize,
        query: &QueryBuilder,
    ) -> Result<String, StoreError> {
        Ok(Self::raw_select_sql(sql, param_count, query).0)
    }

    async fn fetch_raw(
        &self,
        schema: &TableSchema,
        sql: &str,
        params: &[Value],
        query: &QueryBuilder,
    ) -> Result<Vec<Value>, StoreError> {
        let (sql, bound) = Self::raw_select_sql(sql, params.len(), query);
        debug_log!("[FETCH_RAW] SQL: {}", sql);

        // Caller parameters carry no column, so they bind by JSON kind
        let mut sqlx_query = sqlx::query(&sql);
        for param in params {
            sqlx_query = PgParam::new(param.clone(), ParamKind::Untyped).bind(sqlx_query);
        }
        let sqlx_query = bind_columns(sqlx_query, schema, bound);

        self.fetch_json(schema.name, "fetch_raw", sqlx_query).await
    }
}
