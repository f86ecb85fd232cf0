//! Query builder
//!
//! Engine-level description of a read: conditions combined with AND, ordering
//! and paging. Implicit per-entity filters are merged in by the store context
//! before a builder reaches an engine.

use crate::query_builder::filter::QueryFilter;
use crate::query_builder::ordering::SortOrder;
use crate::query_builder::sql_generation::SqlGenerator;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    conditions: Vec<QueryFilter>,
    ordering: Vec<(String, SortOrder)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// AND another condition onto the query
    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.conditions.push(filter);
        self
    }

    /// Sort key; earlier calls take precedence
    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.ordering.push((field.to_string(), order));
        self
    }

    pub fn limit(self, limit: i64) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }

    pub fn offset(self, offset: i64) -> Self {
        Self {
            offset: Some(offset),
            ..self
        }
    }

    /// Place filters ahead of the caller's own conditions
    pub fn with_leading_filters(mut self, filters: &[QueryFilter]) -> Self {
        self.conditions.splice(0..0, filters.iter().cloned());
        self
    }

    pub fn conditions(&self) -> &[QueryFilter] {
        &self.conditions
    }

    pub fn ordering(&self) -> &[(String, SortOrder)] {
        &self.ordering
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    /// WHERE clause and its bound values
    pub fn build_where_clause(&self) -> (String, Vec<Value>) {
        SqlGenerator::build_where_clause(&self.conditions)
    }

    /// (WHERE, ORDER BY, LIMIT/OFFSET, bound values); absent parts are empty
    pub fn build(&self) -> (String, String, String, Vec<Value>) {
        let (where_clause, values) = self.build_where_clause();
        (
            where_clause,
            SqlGenerator::build_order_clause(&self.ordering),
            SqlGenerator::build_limit_clause(self.limit, self.offset),
            values,
        )
    }
}
