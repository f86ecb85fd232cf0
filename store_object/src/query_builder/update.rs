//! Column assignments for bulk updates

use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// How one column changes in a bulk update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperation {
    /// `column = value`
    Set(Value),
    /// `column = column + value`, numeric columns only
    Increment(Value),
    /// `column = column - value`, numeric columns only
    Decrement(Value),
}

impl UpdateOperation {
    /// SQL assignment with the operand bound at `placeholder`
    pub fn to_sql(&self, column: &str, placeholder: &str) -> String {
        match self {
            UpdateOperation::Set(_) => format!("{} = {}", column, placeholder),
            UpdateOperation::Increment(_) => format!("{0} = {0} + {1}", column, placeholder),
            UpdateOperation::Decrement(_) => format!("{0} = {0} - {1}", column, placeholder),
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            UpdateOperation::Set(value)
            | UpdateOperation::Increment(value)
            | UpdateOperation::Decrement(value) => value,
        }
    }

    /// New column value computed from the current one
    ///
    /// `None` when arithmetic meets a non-numeric operand or overflows.
    pub fn apply(&self, current: &Value) -> Option<Value> {
        match self {
            UpdateOperation::Set(value) => Some(value.clone()),
            UpdateOperation::Increment(delta) => offset(current, delta, false),
            UpdateOperation::Decrement(delta) => offset(current, delta, true),
        }
    }
}

fn offset(current: &Value, delta: &Value, subtract: bool) -> Option<Value> {
    if let (Some(base), Some(step)) = (current.as_i64(), delta.as_i64()) {
        let next = if subtract {
            base.checked_sub(step)
        } else {
            base.checked_add(step)
        };
        return next.map(Value::from);
    }

    let (base, step) = (current.as_f64()?, delta.as_f64()?);
    let next = if subtract { base - step } else { base + step };
    Number::from_f64(next).map(Value::Number)
}

/// Assignments of one bulk update, keyed and ordered by column
///
/// Assigning the same column twice keeps the last operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSet {
    operations: BTreeMap<String, UpdateOperation>,
}

impl UpdateSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, column: impl Into<String>, operation: UpdateOperation) -> Self {
        self.operations.insert(column.into(), operation);
        self
    }

    pub fn set(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, UpdateOperation::Set(value.into()))
    }

    pub fn increment(self, column: impl Into<String>, delta: impl Into<Value>) -> Self {
        self.with(column, UpdateOperation::Increment(delta.into()))
    }

    pub fn decrement(self, column: impl Into<String>, delta: impl Into<Value>) -> Self {
        self.with(column, UpdateOperation::Decrement(delta.into()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UpdateOperation)> {
        self.operations.iter()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.operations.contains_key(column)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }
}
