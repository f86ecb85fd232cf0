//! SQL rendering for query builders
//!
//! Values are never inlined: each one becomes a `$N` placeholder and is
//! returned alongside the clause for binding.

use crate::query_builder::filter::{LogicalOperator, QueryCondition, QueryFilter, QueryOperator};
use crate::query_builder::ordering::SortOrder;
use crate::query_builder::update::UpdateSet;
use serde_json::Value;

const ALWAYS: &str = "1=1";
const NEVER: &str = "1=0";

/// A bound parameter and the column it is compared with or assigned to
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub column: String,
    pub value: Value,
}

fn values_only(bound: Vec<BoundValue>) -> Vec<Value> {
    bound.into_iter().map(|param| param.value).collect()
}

/// Collects bound values while handing out their placeholders
struct Params {
    next: usize,
    values: Vec<BoundValue>,
}

impl Params {
    fn starting_at(first: usize) -> Self {
        Self {
            next: first,
            values: Vec::new(),
        }
    }

    fn bind(&mut self, column: &str, value: &Value) -> String {
        self.values.push(BoundValue {
            column: column.to_string(),
            value: value.clone(),
        });
        let placeholder = format!("${}", self.next);
        self.next += 1;
        placeholder
    }
}

pub struct SqlGenerator;

impl SqlGenerator {
    /// Build WHERE clause from conditions, numbering placeholders from `$1`
    pub fn build_where_clause(conditions: &[QueryFilter]) -> (String, Vec<Value>) {
        Self::build_where_clause_from(conditions, 1)
    }

    /// Build WHERE clause with the first placeholder numbered `first_param`
    ///
    /// Top-level conditions are joined with AND. No conditions yield an empty
    /// clause.
    pub fn build_where_clause_from(
        conditions: &[QueryFilter],
        first_param: usize,
    ) -> (String, Vec<Value>) {
        let (clause, bound) = Self::build_where_clause_bound(conditions, first_param);
        (clause, values_only(bound))
    }

    /// Like [`SqlGenerator::build_where_clause_from`], keeping the column of
    /// every bound value
    pub fn build_where_clause_bound(
        conditions: &[QueryFilter],
        first_param: usize,
    ) -> (String, Vec<BoundValue>) {
        if conditions.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut params = Params::starting_at(first_param);
        let rendered: Vec<String> = conditions
            .iter()
            .map(|filter| Self::render_filter(filter, &mut params))
            .collect();

        (format!("WHERE {}", rendered.join(" AND ")), params.values)
    }

    fn render_filter(filter: &QueryFilter, params: &mut Params) -> String {
        match filter {
            QueryFilter::Condition(condition) => Self::render_condition(condition, params),
            QueryFilter::Group { operator, filters } => {
                let (joiner, empty) = match operator {
                    LogicalOperator::And => (" AND ", ALWAYS),
                    LogicalOperator::Or => (" OR ", NEVER),
                };
                if filters.is_empty() {
                    return empty.to_string();
                }

                let parts: Vec<String> = filters
                    .iter()
                    .map(|inner| Self::render_filter(inner, params))
                    .collect();
                format!("({})", parts.join(joiner))
            }
            QueryFilter::Not(inner) => format!("NOT ({})", Self::render_filter(inner, params)),
        }
    }

    fn render_condition(condition: &QueryCondition, params: &mut Params) -> String {
        let field = condition.field.as_str();
        let operand = condition.value.as_ref();

        match condition.operator {
            QueryOperator::IsNull => return format!("{} IS NULL", field),
            QueryOperator::IsNotNull => return format!("{} IS NOT NULL", field),
            // `= NULL` is never true in SQL; equality with null means a NULL test
            QueryOperator::Eq if operand.is_none_or(Value::is_null) => {
                return format!("{} IS NULL", field);
            }
            QueryOperator::Ne if operand.is_none_or(Value::is_null) => {
                return format!("{} IS NOT NULL", field);
            }
            operator if operator.takes_list() => {
                return Self::render_list(field, operator, operand, params);
            }
            _ => {}
        }

        match (condition.operator.comparison(), operand) {
            (Some(symbol), Some(value)) => {
                format!("{} {} {}", field, symbol, params.bind(field, value))
            }
            // Malformed condition matches nothing
            _ => NEVER.to_string(),
        }
    }

    fn render_list(
        field: &str,
        operator: QueryOperator,
        operand: Option<&Value>,
        params: &mut Params,
    ) -> String {
        let negated = operator == QueryOperator::NotIn;

        // IN () is not valid SQL
        let items = match operand {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => return if negated { ALWAYS } else { NEVER }.to_string(),
        };

        let placeholders: Vec<String> = items.iter().map(|item| params.bind(field, item)).collect();
        let keyword = if negated { "NOT IN" } else { "IN" };
        format!("{} {} ({})", field, keyword, placeholders.join(", "))
    }

    /// Build ORDER BY clause
    pub fn build_order_clause(order_by: &[(String, SortOrder)]) -> String {
        if order_by.is_empty() {
            return String::new();
        }

        let items: Vec<String> = order_by
            .iter()
            .map(|(field, order)| format!("{} {}", field, order.to_sql()))
            .collect();
        format!("ORDER BY {}", items.join(", "))
    }

    /// Build LIMIT/OFFSET clause
    pub fn build_limit_clause(limit: Option<i64>, offset: Option<i64>) -> String {
        let limit = limit.map(|limit| format!("LIMIT {}", limit));
        let offset = offset.map(|offset| format!("OFFSET {}", offset));
        limit.into_iter().chain(offset).collect::<Vec<_>>().join(" ")
    }

    /// Build the SET list of a bulk UPDATE, numbering placeholders from `$1`
    pub fn build_set_clause(updates: &UpdateSet) -> (String, Vec<Value>) {
        let (clause, bound) = Self::build_set_clause_bound(updates);
        (clause, values_only(bound))
    }

    pub fn build_set_clause_bound(updates: &UpdateSet) -> (String, Vec<BoundValue>) {
        let mut params = Params::starting_at(1);
        let assignments: Vec<String> = updates
            .iter()
            .map(|(field, operation)| {
                operation.to_sql(field, &params.bind(field, operation.value()))
            })
            .collect();

        (assignments.join(", "), params.values)
    }
}
