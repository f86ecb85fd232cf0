//! Model registry
//!
//! Holds the table layout, capability set and implicit read filters of every
//! registered entity type. Registration validates the layout once, at setup,
//! so a badly declared type fails before any query runs.

use crate::errors::StoreError;
use crate::query_builder::QueryFilter;
use crate::traits::{Capabilities, Entity, TableSchema};
use crate::validation::{ValidatedFieldName, ValidatedTableName};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Registered entity type
#[derive(Debug, Clone)]
pub struct EntityModel {
    schema: TableSchema,
    capabilities: Capabilities,
    filters: Vec<QueryFilter>,
}

impl EntityModel {
    pub fn table(&self) -> &'static str {
        self.schema.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Predicates merged into every read of this type unless bypassed
    pub fn implicit_filters(&self) -> &[QueryFilter] {
        &self.filters
    }
}

/// Per-table registry of entity models and their implicit filters
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: Vec<EntityModel>,
    index: HashMap<&'static str, usize>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type
    ///
    /// Soft-deletable types get the `removed == false` filter automatically.
    /// Tables referenced by foreign keys must be registered first.
    pub fn register<T: Entity>(&mut self) -> Result<&mut Self, StoreError> {
        let schema = TableSchema::of::<T>();
        let capabilities = T::capabilities();
        let table = schema.name;

        ValidatedTableName::new(table)?;

        if self.index.contains_key(table) {
            return Err(StoreError::configuration(table, "entity type registered twice"));
        }

        let mut seen = HashSet::new();
        for column in schema.columns {
            ValidatedFieldName::new(column.name)?;
            if !seen.insert(column.name) {
                return Err(StoreError::configuration(
                    table,
                    format!("column '{}' declared more than once", column.name),
                ));
            }
            if let Some(target) = column.references {
                if target != table && !self.index.contains_key(target) {
                    return Err(StoreError::configuration(
                        table,
                        format!(
                            "column '{}' references unregistered table '{}'",
                            column.name, target
                        ),
                    ));
                }
            }
        }

        Self::require_column(&schema, schema.primary_key, "primary key")?;

        let mut filters = Vec::new();

        if let Some(removed) = capabilities.removed_field() {
            Self::require_column(&schema, removed, "soft-delete")?;
            filters.push(QueryFilter::eq(removed, json!(false)));
        }

        if let Some(stamps) = capabilities.timestamp_fields() {
            Self::require_column(&schema, stamps.created_at, "time-tracking")?;
            Self::require_column(&schema, stamps.updated_at, "time-tracking")?;
        }

        info!(
            table,
            soft_delete = capabilities.is_soft_deletable(),
            time_tracked = capabilities.is_time_tracked(),
            "Registered entity type"
        );

        self.index.insert(table, self.models.len());
        self.models.push(EntityModel {
            schema,
            capabilities,
            filters,
        });

        Ok(self)
    }

    fn require_column(schema: &TableSchema, column: &str, purpose: &str) -> Result<(), StoreError> {
        ValidatedFieldName::new(column)?;
        if schema.has_column(column) {
            Ok(())
        } else {
            Err(StoreError::configuration(
                schema.name,
                format!("{} column '{}' is not a storage column", purpose, column),
            ))
        }
    }

    /// Add an implicit filter to an already registered type
    pub fn register_filter<T: Entity>(&mut self, filter: QueryFilter) -> Result<&mut Self, StoreError> {
        let table = T::table_name();
        let position = *self
            .index
            .get(table)
            .ok_or_else(|| StoreError::UnknownEntity(table.to_string()))?;
        let model = &mut self.models[position];

        for field in filter.fields() {
            if !model.schema.has_column(field) {
                return Err(StoreError::configuration(
                    table,
                    format!("filter references unknown column '{}'", field),
                ));
            }
        }

        model.filters.push(filter);
        Ok(self)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.index.contains_key(table)
    }

    pub fn model(&self, table: &str) -> Option<&EntityModel> {
        self.index.get(table).map(|&position| &self.models[position])
    }

    pub fn model_of<T: Entity>(&self) -> Result<&EntityModel, StoreError> {
        self.model(T::table_name())
            .ok_or_else(|| StoreError::UnknownEntity(T::table_name().to_string()))
    }

    /// Models in registration order (foreign key targets first)
    pub fn models(&self) -> impl DoubleEndedIterator<Item = &EntityModel> {
        self.models.iter()
    }

    /// (table, column) of every soft-delete flag, for index creation
    pub fn soft_delete_columns(&self) -> Vec<(&'static str, &'static str)> {
        self.models
            .iter()
            .filter_map(|model| {
                model
                    .capabilities
                    .removed_field()
                    .map(|column| (model.table(), column))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
