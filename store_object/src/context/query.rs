//! Typed queries over a store context
//!
//! Implicit filters registered for the entity type are placed ahead of the
//! caller's own conditions on every read and bulk statement, unless the
//! query opts out with [`EntityQuery::include_removed`].

use crate::context::StoreContext;
use crate::errors::StoreError;
use crate::model::EntityModel;
use crate::query_builder::{QueryBuilder, QueryFilter, SortOrder, UpdateSet};
use crate::traits::{Entity, EntityId};
use serde_json::{json, Value};
use std::marker::PhantomData;
use tracing::debug;

/// No-tracking query over one entity type
#[derive(Debug)]
pub struct EntityQuery<'a, T: Entity> {
    context: &'a StoreContext,
    builder: QueryBuilder,
    include_removed: bool,
    _entity: PhantomData<T>,
}

impl<'a, T: Entity> EntityQuery<'a, T> {
    pub(crate) fn new(context: &'a StoreContext) -> Self {
        Self {
            context,
            builder: QueryBuilder::new(),
            include_removed: false,
            _entity: PhantomData,
        }
    }

    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.builder = self.builder.filter(filter);
        self
    }

    /// Restrict to one primary key
    pub fn with_key(self, id: EntityId) -> Self {
        self.filter(QueryFilter::eq(T::primary_key_field(), json!(id)))
    }

    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.builder = self.builder.order_by(field, order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.builder = self.builder.limit(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.builder = self.builder.offset(offset);
        self
    }

    /// Bypass the implicit filters, soft-deleted rows included
    pub fn include_removed(mut self) -> Self {
        self.include_removed = true;
        self
    }

    /// Read through a caller-written SELECT instead of the entity's table
    ///
    /// `sql` must return the entity's columns and refers to `params` as
    /// `$1..$n`. Filters, ordering, paging and the implicit filters still
    /// apply on top of it.
    pub fn from_sql(
        self,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = Value>,
    ) -> RawQuery<'a, T> {
        RawQuery {
            query: self,
            sql: sql.into(),
            params: params.into_iter().collect(),
        }
    }

    fn model(&self) -> Result<&'a EntityModel, StoreError> {
        self.context.model.model_of::<T>()
    }

    fn check_column(model: &EntityModel, column: &str) -> Result<(), StoreError> {
        if model.schema().has_column(column) {
            Ok(())
        } else {
            Err(StoreError::UnknownColumn {
                table: model.table().to_string(),
                column: column.to_string(),
            })
        }
    }

    /// The builder handed to the engine, implicit filters merged in
    pub fn to_query_builder(&self) -> Result<QueryBuilder, StoreError> {
        let model = self.model()?;

        for condition in self.builder.conditions() {
            for field in condition.fields() {
                Self::check_column(model, field)?;
            }
        }
        for (field, _) in self.builder.ordering() {
            Self::check_column(model, field)?;
        }

        if self.include_removed {
            Ok(self.builder.clone())
        } else {
            Ok(self
                .builder
                .clone()
                .with_leading_filters(model.implicit_filters()))
        }
    }

    fn decode(row: Value) -> Result<T, StoreError> {
        serde_json::from_value(row).map_err(|e| StoreError::serialization(T::table_name(), e))
    }

    pub async fn to_list(self) -> Result<Vec<T>, StoreError> {
        let builder = self.to_query_builder()?;
        let rows = self.context.engine.fetch(self.model()?.schema(), &builder).await?;
        rows.into_iter().map(Self::decode).collect()
    }

    pub async fn first(self) -> Result<Option<T>, StoreError> {
        let builder = self.to_query_builder()?.limit(1);
        let rows = self.context.engine.fetch(self.model()?.schema(), &builder).await?;
        rows.into_iter().next().map(Self::decode).transpose()
    }

    pub async fn count(self) -> Result<i64, StoreError> {
        let builder = self.to_query_builder()?;
        self.context.engine.count(self.model()?.schema(), &builder).await
    }

    pub async fn any(self) -> Result<bool, StoreError> {
        Ok(self.count().await? > 0)
    }

    /// Bulk update of every matching row, bypassing change tracking
    ///
    /// Time-tracked types get `updated_at` stamped unless the update sets it.
    /// Ordering and paging do not apply to bulk statements.
    pub async fn execute_update(self, updates: UpdateSet) -> Result<u64, StoreError> {
        let model = self.model()?;
        for field in updates.fields() {
            Self::check_column(model, field)?;
            if field == model.schema().primary_key {
                return Err(StoreError::Unsupported(format!(
                    "bulk update of primary key '{}'",
                    field
                )));
            }
        }
        if updates.is_empty() {
            return Ok(0);
        }

        let updates = self.stamp_update(model, updates)?;
        let builder = self.to_query_builder()?;
        let affected = self
            .context
            .engine
            .update_where(model.schema(), &updates, &builder)
            .await?;

        debug!(table = T::table_name(), affected, "Bulk update executed");
        Ok(affected)
    }

    /// Bulk delete of every matching row, bypassing change tracking
    ///
    /// Soft-deletable types are flagged in place; other types are erased.
    pub async fn execute_delete(self) -> Result<u64, StoreError> {
        let model = self.model()?;
        let builder = self.to_query_builder()?;

        let affected = match model.capabilities().removed_field() {
            Some(removed) => {
                let updates = self.stamp_update(model, UpdateSet::new().set(removed, json!(true)))?;
                self.context
                    .engine
                    .update_where(model.schema(), &updates, &builder)
                    .await?
            }
            None => {
                self.context
                    .engine
                    .delete_where(model.schema(), &builder)
                    .await?
            }
        };

        debug!(
            table = T::table_name(),
            affected,
            soft = model.capabilities().is_soft_deletable(),
            "Bulk delete executed"
        );
        Ok(affected)
    }

    fn stamp_update(&self, model: &EntityModel, updates: UpdateSet) -> Result<UpdateSet, StoreError> {
        let Some(stamps) = model.capabilities().timestamp_fields() else {
            return Ok(updates);
        };
        if updates.contains(stamps.updated_at) {
            return Ok(updates);
        }

        let now = serde_json::to_value(self.context.clock.now())
            .map_err(|e| StoreError::serialization(T::table_name(), e))?;
        Ok(updates.set(stamps.updated_at, now))
    }
}

/// Raw SQL read composed with the entity's filters
#[derive(Debug)]
pub struct RawQuery<'a, T: Entity> {
    query: EntityQuery<'a, T>,
    sql: String,
    params: Vec<Value>,
}

impl<'a, T: Entity> RawQuery<'a, T> {
    fn checked_sql(&self) -> Result<&str, StoreError> {
        let sql = self.sql.trim().trim_end_matches(';').trim_end();
        if sql.is_empty() {
            return Err(StoreError::Unsupported("empty raw SQL query".to_string()));
        }
        Ok(sql)
    }

    /// The statement the engine would run, for logging and inspection
    pub fn to_query_string(&self) -> Result<String, StoreError> {
        let builder = self.query.to_query_builder()?;
        let schema = self.query.model()?.schema();
        self.query
            .context
            .engine
            .raw_query_string(schema, self.checked_sql()?, self.params.len(), &builder)
    }

    pub async fn to_list(self) -> Result<Vec<T>, StoreError> {
        let builder = self.query.to_query_builder()?;
        let schema = self.query.model()?.schema();
        let sql = self.checked_sql()?;
        debug!(table = T::table_name(), params = self.params.len(), "Running raw query");

        let rows = self
            .query
            .context
            .engine
            .fetch_raw(schema, sql, &self.params, &builder)
            .await?;
        rows.into_iter().map(EntityQuery::<T>::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::MemoryEngine;
    use crate::model::ModelRegistry;
    use crate::test_support::{manual_clock, t0, Lecturer, Memo};
    use crate::traits::{PersistenceEngine, TableSchema};
    use chrono::Duration;
    use std::sync::Arc;

    async fn seeded() -> (StoreContext, ManualClock) {
        let engine = MemoryEngine::new();
        engine.ensure_table(&TableSchema::of::<Lecturer>()).await.unwrap();
        engine.ensure_table(&TableSchema::of::<Memo>()).await.unwrap();

        let mut registry = ModelRegistry::new();
        registry
            .register::<Lecturer>()
            .unwrap()
            .register::<Memo>()
            .unwrap();

        let clock = manual_clock();
        let mut context =
            StoreContext::new(Arc::new(engine), Arc::new(registry), Arc::new(clock.clone()));

        for name in ["Ada", "Grace", "Alan", "Barbara"] {
            context.add(Lecturer::new(name)).unwrap();
        }
        for text in ["first", "second"] {
            context.add(Memo { id: 0, text: Some(text.into()) }).unwrap();
        }
        context.save_changes().await.unwrap();
        (context, clock)
    }

    fn names(lecturers: &[Lecturer]) -> Vec<&str> {
        lecturers.iter().map(|l| l.name.as_str()).collect()
    }

    #[tokio::test]
    async fn implicit_filter_hides_removed_rows() {
        let (mut context, _) = seeded().await;
        let grace = context.entry_id_of::<Lecturer>(2).unwrap();
        context.remove_entry(grace).unwrap();
        context.save_changes().await.unwrap();

        let visible = context.query::<Lecturer>().to_list().await.unwrap();
        assert_eq!(names(&visible), vec!["Ada", "Alan", "Barbara"]);
        assert_eq!(context.query::<Lecturer>().count().await.unwrap(), 3);

        let all = context.query::<Lecturer>().include_removed().to_list().await.unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.iter().any(|l| l.name == "Grace" && l.is_deleted));

        assert!(context.find::<Lecturer>(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn filters_ordering_and_paging() {
        let (context, _) = seeded().await;

        let page = context
            .query::<Lecturer>()
            .filter(QueryFilter::like("name", "A%"))
            .order_by("name", SortOrder::Desc)
            .to_list()
            .await
            .unwrap();
        assert_eq!(names(&page), vec!["Alan", "Ada"]);

        let second = context
            .query::<Lecturer>()
            .order_by("name", SortOrder::Asc)
            .offset(1)
            .first()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.name, "Alan");

        assert!(context
            .query::<Memo>()
            .filter(QueryFilter::eq("text", json!("second")))
            .any()
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_columns_are_rejected() {
        let (context, _) = seeded().await;

        let err = context
            .query::<Lecturer>()
            .filter(QueryFilter::eq("salary", json!(1)))
            .to_list()
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));

        let err = context
            .query::<Lecturer>()
            .order_by("name; DROP TABLE lecturers", SortOrder::Asc)
            .count()
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }

    #[tokio::test]
    async fn bulk_update_stamps_updated_at() {
        let (context, clock) = seeded().await;
        clock.advance(Duration::hours(1));

        let affected = context
            .query::<Lecturer>()
            .filter(QueryFilter::like("name", "A%"))
            .execute_update(UpdateSet::new().set("name", json!("Anonymous")))
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let renamed = context
            .query::<Lecturer>()
            .filter(QueryFilter::eq("name", json!("Anonymous")))
            .to_list()
            .await
            .unwrap();
        assert_eq!(renamed.len(), 2);
        for lecturer in renamed {
            assert_eq!(lecturer.created_at, t0());
            assert_eq!(lecturer.updated_at, t0() + Duration::hours(1));
        }

        let err = context
            .query::<Lecturer>()
            .execute_update(UpdateSet::new().set("id", json!(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[tokio::test]
    async fn bulk_delete_flags_soft_deletable_rows() {
        let (context, _) = seeded().await;

        let affected = context
            .query::<Lecturer>()
            .filter(QueryFilter::like("name", "A%"))
            .execute_delete()
            .await
            .unwrap();
        assert_eq!(affected, 2);

        // Already removed rows are not counted again
        let again = context
            .query::<Lecturer>()
            .filter(QueryFilter::like("name", "A%"))
            .execute_delete()
            .await
            .unwrap();
        assert_eq!(again, 0);

        assert_eq!(context.query::<Lecturer>().count().await.unwrap(), 2);
        assert_eq!(
            context.query::<Lecturer>().include_removed().count().await.unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn bulk_delete_erases_plain_rows() {
        let (context, _) = seeded().await;

        let affected = context.query::<Memo>().execute_delete().await.unwrap();

        assert_eq!(affected, 2);
        assert_eq!(
            context.query::<Memo>().include_removed().count().await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn raw_sql_needs_a_raw_capable_engine() {
        let (context, _) = seeded().await;

        let err = context
            .query::<Lecturer>()
            .from_sql("SELECT * FROM lecturers WHERE id = $1", [json!(1)])
            .to_list()
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));

        let err = context
            .query::<Lecturer>()
            .from_sql(" ; ", [])
            .to_query_string()
            .unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }
}
