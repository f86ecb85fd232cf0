use crate::query_builder::sql_generation::SqlGenerator;
use crate::query_builder::{QueryBuilder, QueryFilter, QueryOperator, SortOrder, UpdateSet};
use serde_json::json;

// ========================================
// QueryFilter
// ========================================

#[test]
fn test_query_filter_constructors() {
    let filter = QueryFilter::is_null("text");
    match filter {
        QueryFilter::Condition(condition) => {
            assert_eq!(condition.field, "text");
            assert_eq!(condition.operator, QueryOperator::IsNull);
            assert!(condition.value.is_none());
        }
        _ => panic!("expected a condition"),
    }

    let filter = QueryFilter::like("name", "J%");
    assert!(matches!(
        filter,
        QueryFilter::Condition(ref c) if c.operator == QueryOperator::Like && c.value == Some(json!("J%"))
    ));
}

#[test]
fn test_query_filter_fields_include_nested_groups() {
    let filter = QueryFilter::and(vec![
        QueryFilter::eq("is_deleted", json!(false)),
        QueryFilter::or(vec![
            QueryFilter::gt("age", json!(18)),
            !QueryFilter::like("name", "J%"),
        ]),
    ]);

    assert_eq!(filter.fields(), vec!["is_deleted", "age", "name"]);
}

// ========================================
// SQL Generation
// ========================================

#[test]
fn test_sql_generation_empty_conditions() {
    let (where_clause, values) = SqlGenerator::build_where_clause(&[]);
    assert_eq!(where_clause, "");
    assert!(values.is_empty());
}

#[test]
fn test_sql_generation_empty_arrays() {
    let (where_clause, values) =
        SqlGenerator::build_where_clause(&[QueryFilter::in_values("id", vec![])]);
    assert_eq!(where_clause, "WHERE 1=0");
    assert!(values.is_empty());

    let (where_clause, _) =
        SqlGenerator::build_where_clause(&[QueryFilter::not_in_values("id", vec![])]);
    assert_eq!(where_clause, "WHERE 1=1");
}

#[test]
fn test_sql_generation_null_values() {
    let (where_clause, values) =
        SqlGenerator::build_where_clause(&[QueryFilter::eq("text", json!(null))]);
    assert_eq!(where_clause, "WHERE text IS NULL");
    assert!(values.is_empty());

    let (where_clause, _) =
        SqlGenerator::build_where_clause(&[QueryFilter::ne("text", json!(null))]);
    assert_eq!(where_clause, "WHERE text IS NOT NULL");
}

#[test]
fn test_sql_generation_invalid_operator_value_combinations() {
    let filter = QueryFilter::condition("age", QueryOperator::Gt, None);
    let (where_clause, values) = SqlGenerator::build_where_clause(&[filter]);
    assert_eq!(where_clause, "WHERE 1=0");
    assert!(values.is_empty());
}

#[test]
fn test_sql_generation_groups_and_negation() {
    let filters = vec![
        QueryFilter::eq("is_deleted", json!(false)),
        QueryFilter::or(vec![
            QueryFilter::like("name", "J%"),
            !QueryFilter::in_values("age", vec![json!(20), json!(21)]),
        ]),
    ];

    let (where_clause, values) = SqlGenerator::build_where_clause(&filters);
    assert_eq!(
        where_clause,
        "WHERE is_deleted = $1 AND (name LIKE $2 OR NOT (age IN ($3, $4)))"
    );
    assert_eq!(values, vec![json!(false), json!("J%"), json!(20), json!(21)]);
}

#[test]
fn test_sql_generation_empty_groups() {
    let (where_clause, _) = SqlGenerator::build_where_clause(&[QueryFilter::and(vec![])]);
    assert_eq!(where_clause, "WHERE 1=1");

    let (where_clause, _) = SqlGenerator::build_where_clause(&[QueryFilter::or(vec![])]);
    assert_eq!(where_clause, "WHERE 1=0");
}

#[test]
fn test_sql_generation_parameter_offset() {
    let (where_clause, values) = SqlGenerator::build_where_clause_from(
        &[
            QueryFilter::eq("student_id", json!(7)),
            QueryFilter::gte("age", json!(18)),
        ],
        3,
    );
    assert_eq!(where_clause, "WHERE student_id = $3 AND age >= $4");
    assert_eq!(values.len(), 2);
}

#[test]
fn test_bound_values_keep_their_columns() {
    let (where_clause, bound) = SqlGenerator::build_where_clause_bound(
        &[
            QueryFilter::eq("name", json!("2024-01-01T10:00:00Z")),
            QueryFilter::in_values("age", vec![json!(20), json!(21)]),
            QueryFilter::is_null("text"),
        ],
        1,
    );
    assert_eq!(
        where_clause,
        "WHERE name = $1 AND age IN ($2, $3) AND text IS NULL"
    );
    let columns: Vec<&str> = bound.iter().map(|param| param.column.as_str()).collect();
    assert_eq!(columns, vec!["name", "age", "age"]);

    let (_, bound) = SqlGenerator::build_set_clause_bound(
        &UpdateSet::new().set("updated_at", json!("2024-01-01T10:00:00Z")),
    );
    assert_eq!(bound[0].column, "updated_at");
}

#[test]
fn test_set_clause_generation() {
    let updates = UpdateSet::new()
        .set("name", json!("Johnny"))
        .increment("age", json!(1));

    let (set_clause, values) = SqlGenerator::build_set_clause(&updates);
    // Columns are ordered by name
    assert_eq!(set_clause, "age = age + $1, name = $2");
    assert_eq!(values, vec![json!(1), json!("Johnny")]);
}

// ========================================
// QueryBuilder
// ========================================

#[test]
fn test_query_builder_empty_state() {
    let (where_clause, order_clause, limit_clause, values) = QueryBuilder::new().build();

    assert_eq!(where_clause, "");
    assert_eq!(order_clause, "");
    assert_eq!(limit_clause, "");
    assert!(values.is_empty());
    assert_eq!(QueryBuilder::new(), QueryBuilder::default());
}

#[test]
fn test_query_builder_method_chaining_order() {
    let builder1 = QueryBuilder::new()
        .filter(QueryFilter::eq("name", json!("John")))
        .order_by("created_at", SortOrder::Desc)
        .limit(10)
        .offset(5);

    let builder2 = QueryBuilder::new()
        .limit(10)
        .filter(QueryFilter::eq("name", json!("John")))
        .offset(5)
        .order_by("created_at", SortOrder::Desc);

    assert_eq!(builder1.build(), builder2.build());
}

#[test]
fn test_leading_filters_come_first() {
    let builder = QueryBuilder::new()
        .filter(QueryFilter::eq("name", json!("John")))
        .with_leading_filters(&[QueryFilter::eq("is_deleted", json!(false))]);

    let (where_clause, _, _, values) = builder.build();
    assert_eq!(where_clause, "WHERE is_deleted = $1 AND name = $2");
    assert_eq!(values, vec![json!(false), json!("John")]);

    let untouched = QueryBuilder::new().with_leading_filters(&[]);
    assert!(untouched.conditions().is_empty());
}

// ========================================
// Ordering and Paging
// ========================================

#[test]
fn test_sort_order_sql_conversion() {
    assert_eq!(SortOrder::Asc.to_sql(), "ASC");
    assert_eq!(SortOrder::Desc.to_sql(), "DESC");
}

#[test]
fn test_order_clause_generation() {
    let orders = vec![
        ("age".to_string(), SortOrder::Desc),
        ("name".to_string(), SortOrder::Asc),
    ];
    assert_eq!(
        SqlGenerator::build_order_clause(&orders),
        "ORDER BY age DESC, name ASC"
    );
}

#[test]
fn test_limit_clause_generation() {
    assert_eq!(SqlGenerator::build_limit_clause(None, None), "");
    assert_eq!(SqlGenerator::build_limit_clause(Some(10), None), "LIMIT 10");
    assert_eq!(SqlGenerator::build_limit_clause(None, Some(20)), "OFFSET 20");
    assert_eq!(
        SqlGenerator::build_limit_clause(Some(10), Some(20)),
        "LIMIT 10 OFFSET 20"
    );
}

// ========================================
// Update Operations
// ========================================

#[test]
fn test_update_operation_apply() {
    let updates = UpdateSet::new()
        .increment("age", json!(2))
        .decrement("credits", json!(0.5))
        .set("name", json!("Stuart"));

    let applied: Vec<_> = updates
        .iter()
        .map(|(field, op)| {
            let current = match field.as_str() {
                "age" => json!(20),
                "credits" => json!(3.0),
                _ => json!("John"),
            };
            op.apply(&current)
        })
        .collect();

    assert_eq!(
        applied,
        vec![Some(json!(22)), Some(json!(2.5)), Some(json!("Stuart"))]
    );
}

#[test]
fn test_update_operation_rejects_non_numeric_arithmetic() {
    let updates = UpdateSet::new().increment("name", json!(1));
    let (_, op) = updates.iter().next().unwrap();

    assert_eq!(op.apply(&json!("John")), None);
}
