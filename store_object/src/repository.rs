//! Generic repository over a store context
//!
//! Thin per-type facade; all writes stay pending in the context until it is
//! saved.

use crate::context::StoreContext;
use crate::errors::StoreError;
use crate::query_builder::QueryFilter;
use crate::tracker::EntryId;
use crate::traits::{Entity, EntityId};
use async_trait::async_trait;
use std::marker::PhantomData;

#[async_trait]
pub trait Repository<T: Entity>: Send {
    /// All visible entities, optionally narrowed by a filter
    async fn get_all(&self, filter: Option<QueryFilter>) -> Result<Vec<T>, StoreError>;

    async fn get_by_id(&self, id: EntityId) -> Result<Option<T>, StoreError>;

    fn add(&mut self, entity: T) -> Result<EntryId, StoreError>;

    /// Schedule deletion; returns `false` when no visible entity has that key
    async fn delete(&mut self, id: EntityId) -> Result<bool, StoreError>;
}

#[derive(Debug)]
pub struct GenericRepository<'c, T: Entity> {
    context: &'c mut StoreContext,
    _entity: PhantomData<T>,
}

impl<'c, T: Entity> GenericRepository<'c, T> {
    pub fn new(context: &'c mut StoreContext) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<'c, T: Entity> Repository<T> for GenericRepository<'c, T> {
    async fn get_all(&self, filter: Option<QueryFilter>) -> Result<Vec<T>, StoreError> {
        let query = self.context.query::<T>();
        match filter {
            Some(filter) => query.filter(filter).to_list().await,
            None => query.to_list().await,
        }
    }

    async fn get_by_id(&self, id: EntityId) -> Result<Option<T>, StoreError> {
        self.context.find::<T>(id).await
    }

    fn add(&mut self, entity: T) -> Result<EntryId, StoreError> {
        self.context.add(entity)
    }

    async fn delete(&mut self, id: EntityId) -> Result<bool, StoreError> {
        match self.context.find_tracked::<T>(id).await? {
            Some(entry_id) => {
                self.context.remove_entry(entry_id)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
