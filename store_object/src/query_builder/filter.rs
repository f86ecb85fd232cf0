//! Query filters
//!
//! Filters are plain data: the PostgreSQL engine renders them to SQL and the
//! in-memory engine evaluates them against JSON rows. Both follow SQL
//! semantics, so a comparison with NULL is never true.

use serde_json::Value;
use std::ops::Not;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    /// Case-insensitive LIKE
    ILike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl QueryOperator {
    /// Binary SQL operator, for operators comparing a column with one value
    pub fn comparison(self) -> Option<&'static str> {
        match self {
            QueryOperator::Eq => Some("="),
            QueryOperator::Ne => Some("!="),
            QueryOperator::Gt => Some(">"),
            QueryOperator::Gte => Some(">="),
            QueryOperator::Lt => Some("<"),
            QueryOperator::Lte => Some("<="),
            QueryOperator::Like => Some("LIKE"),
            QueryOperator::ILike => Some("ILIKE"),
            QueryOperator::In
            | QueryOperator::NotIn
            | QueryOperator::IsNull
            | QueryOperator::IsNotNull => None,
        }
    }

    /// Whether the operand is a list of values
    pub fn takes_list(self) -> bool {
        matches!(self, QueryOperator::In | QueryOperator::NotIn)
    }
}

/// One column test
///
/// `value` is `None` for the NULL tests; for `In`/`NotIn` it holds an array.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCondition {
    pub field: String,
    pub operator: QueryOperator,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// A condition, a group of filters, or a negated filter
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    Condition(QueryCondition),
    Group {
        operator: LogicalOperator,
        filters: Vec<QueryFilter>,
    },
    Not(Box<QueryFilter>),
}

impl QueryFilter {
    pub fn condition(
        field: impl Into<String>,
        operator: QueryOperator,
        value: Option<Value>,
    ) -> Self {
        Self::Condition(QueryCondition {
            field: field.into(),
            operator,
            value,
        })
    }

    fn compare(field: impl Into<String>, operator: QueryOperator, value: impl Into<Value>) -> Self {
        Self::condition(field, operator, Some(value.into()))
    }

    /// All filters must hold; an empty group is true
    pub fn and(filters: Vec<QueryFilter>) -> Self {
        Self::Group {
            operator: LogicalOperator::And,
            filters,
        }
    }

    /// Any filter must hold; an empty group is false
    pub fn or(filters: Vec<QueryFilter>) -> Self {
        Self::Group {
            operator: LogicalOperator::Or,
            filters,
        }
    }

    /// Equality; a JSON `null` operand means IS NULL
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, QueryOperator::Eq, value)
    }

    /// Inequality; a JSON `null` operand means IS NOT NULL
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, QueryOperator::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, QueryOperator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, QueryOperator::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, QueryOperator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, QueryOperator::Lte, value)
    }

    /// `%` matches any run of characters, `_` exactly one
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(field, QueryOperator::Like, pattern.into())
    }

    pub fn ilike(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(field, QueryOperator::ILike, pattern.into())
    }

    /// Membership test; an empty list matches nothing
    pub fn in_values(field: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self::compare(field, QueryOperator::In, Value::Array(values.into_iter().collect()))
    }

    /// Exclusion test; an empty list matches every non-NULL value
    pub fn not_in_values(field: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self::compare(field, QueryOperator::NotIn, Value::Array(values.into_iter().collect()))
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::condition(field, QueryOperator::IsNull, None)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::condition(field, QueryOperator::IsNotNull, None)
    }

    /// Every column name referenced by this filter, nested groups included
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, fields: &mut Vec<&'a str>) {
        match self {
            QueryFilter::Condition(condition) => fields.push(&condition.field),
            QueryFilter::Group { filters, .. } => {
                filters.iter().for_each(|filter| filter.collect_fields(fields))
            }
            QueryFilter::Not(inner) => inner.collect_fields(fields),
        }
    }
}

impl Not for QueryFilter {
    type Output = QueryFilter;

    fn not(self) -> QueryFilter {
        QueryFilter::Not(Box::new(self))
    }
}
