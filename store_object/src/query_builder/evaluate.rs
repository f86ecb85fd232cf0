//! In-process evaluation of query builders against JSON rows
//!
//! Mirrors the SQL semantics the PostgreSQL engine relies on: comparisons
//! involving NULL are unknown, unknown rows are filtered out, and NULLs sort
//! last ascending and first descending.

use crate::query_builder::builder::QueryBuilder;
use crate::query_builder::filter::{LogicalOperator, QueryCondition, QueryFilter, QueryOperator};
use crate::query_builder::ordering::SortOrder;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// Whether a row satisfies every condition of the query
pub fn matches_query(query: &QueryBuilder, row: &Value) -> bool {
    matches_all(query.conditions(), row)
}

/// Whether a row satisfies all conditions (AND semantics)
pub fn matches_all(conditions: &[QueryFilter], row: &Value) -> bool {
    conditions
        .iter()
        .all(|filter| evaluate(filter, row) == Some(true))
}

/// Three-valued evaluation: `None` is SQL's UNKNOWN
pub fn evaluate(filter: &QueryFilter, row: &Value) -> Option<bool> {
    match filter {
        QueryFilter::Condition(condition) => evaluate_condition(condition, row),
        QueryFilter::Group { operator, filters } => {
            let results = filters.iter().map(|f| evaluate(f, row));
            match operator {
                LogicalOperator::And => {
                    let mut unknown = false;
                    for result in results {
                        match result {
                            Some(false) => return Some(false),
                            None => unknown = true,
                            Some(true) => {}
                        }
                    }
                    if unknown { None } else { Some(true) }
                }
                LogicalOperator::Or => {
                    let mut unknown = false;
                    for result in results {
                        match result {
                            Some(true) => return Some(true),
                            None => unknown = true,
                            Some(false) => {}
                        }
                    }
                    if unknown { None } else { Some(false) }
                }
            }
        }
        QueryFilter::Not(inner) => evaluate(inner, row).map(|result| !result),
    }
}

fn column<'a>(row: &'a Value, field: &str) -> &'a Value {
    row.get(field).unwrap_or(&Value::Null)
}

fn evaluate_condition(condition: &QueryCondition, row: &Value) -> Option<bool> {
    let actual = column(row, &condition.field);

    match &condition.operator {
        QueryOperator::IsNull => return Some(actual.is_null()),
        QueryOperator::IsNotNull => return Some(!actual.is_null()),
        QueryOperator::Eq if condition.value.as_ref().is_none_or(Value::is_null) => {
            return Some(actual.is_null());
        }
        QueryOperator::Ne if condition.value.as_ref().is_none_or(Value::is_null) => {
            return Some(!actual.is_null());
        }
        _ => {}
    }

    // Invalid condition, same as the SQL rendering
    let Some(expected) = condition.value.as_ref() else {
        return Some(false);
    };

    match &condition.operator {
        QueryOperator::In | QueryOperator::NotIn => {
            let negated = condition.operator == QueryOperator::NotIn;
            let candidates = match expected {
                Value::Array(candidates) if !candidates.is_empty() => candidates,
                _ => return Some(negated),
            };
            if actual.is_null() {
                return None;
            }
            let found = candidates
                .iter()
                .any(|candidate| compare_values(actual, candidate) == Some(Ordering::Equal));
            Some(found != negated)
        }
        QueryOperator::Like | QueryOperator::ILike => {
            let case_insensitive = condition.operator == QueryOperator::ILike;
            match (actual, expected) {
                (Value::Null, _) | (_, Value::Null) => None,
                (Value::String(text), Value::String(pattern)) => {
                    Some(like_match(text, pattern, case_insensitive))
                }
                _ => Some(false),
            }
        }
        operator => {
            if actual.is_null() || expected.is_null() {
                return None;
            }
            let ordering = compare_values(actual, expected)?;
            Some(match operator {
                QueryOperator::Eq => ordering == Ordering::Equal,
                QueryOperator::Ne => ordering != Ordering::Equal,
                QueryOperator::Gt => ordering == Ordering::Greater,
                QueryOperator::Gte => ordering != Ordering::Less,
                QueryOperator::Lt => ordering == Ordering::Less,
                QueryOperator::Lte => ordering != Ordering::Greater,
                _ => false,
            })
        }
    }
}

fn as_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Compare two non-null JSON values; `None` when they are not comparable
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                Some(x.cmp(&y))
            } else {
                x.as_f64()?.partial_cmp(&y.as_f64()?)
            }
        }
        (Value::String(x), Value::String(y)) => {
            // Fractional seconds make RFC 3339 strings unsortable as text
            match (as_timestamp(x), as_timestamp(y)) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (x, y) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    /// `%`
    AnyRun,
    /// `_`
    AnyOne,
    Literal(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            // A trailing backslash matches itself
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            other => LikeToken::Literal(other),
        });
    }
    tokens
}

/// SQL LIKE matching with `%`, `_` and backslash escapes
///
/// Greedy two-pointer scan: on a mismatch only the most recent `%` is
/// widened, which keeps matching linear in practice and O(n·m) at worst.
pub fn like_match(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.to_string())
    };
    let text: Vec<char> = text.chars().collect();
    let tokens = like_tokens(&pattern);

    let (mut t, mut p) = (0, 0);
    // Token after the last `%` seen, and the text position it resumes from
    let mut resume: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::AnyRun) => {
                p += 1;
                resume = Some((p, t));
            }
            Some(LikeToken::AnyOne) => {
                t += 1;
                p += 1;
            }
            Some(LikeToken::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match resume {
                Some((after_run, from)) => {
                    p = after_run;
                    t = from + 1;
                    resume = Some((after_run, t));
                }
                None => return false,
            },
        }
    }

    tokens[p..].iter().all(|token| *token == LikeToken::AnyRun)
}

/// Sort rows by the query ordering
pub fn sort_rows(rows: &mut [Value], order_by: &[(String, SortOrder)]) {
    if order_by.is_empty() {
        return;
    }

    rows.sort_by(|a, b| {
        for (field, order) in order_by {
            let ordering = compare_nullable(column(a, field), column(b, field));
            let ordering = match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn compare_nullable(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_values(a, b).unwrap_or(Ordering::Equal),
    }
}

/// Apply the complete query (filter, order, offset, limit) to a row set
pub fn apply_query(rows: impl IntoIterator<Item = Value>, query: &QueryBuilder) -> Vec<Value> {
    let mut selected: Vec<Value> = rows
        .into_iter()
        .filter(|row| matches_query(query, row))
        .collect();

    sort_rows(&mut selected, query.ordering());

    let offset = query.offset_value().unwrap_or(0).max(0) as usize;
    let limit = query
        .limit_value()
        .map(|limit| limit.max(0) as usize)
        .unwrap_or(usize::MAX);

    selected.into_iter().skip(offset).take(limit).collect()
}
