//! Unit of work
//!
//! A [`StoreContext`] tracks entities in memory and commits their changes in
//! one batch. Before the batch is serialized the interceptor pipeline runs,
//! the audit interceptor first, so soft deletes and timestamps are applied
//! to exactly what gets written.

pub mod query;

pub use query::{EntityQuery, RawQuery};

use crate::clock::Clock;
use crate::errors::StoreError;
use crate::model::ModelRegistry;
use crate::tracker::{
    AuditInterceptor, EntityState, EntryId, SaveInterceptor, TrackedEntity, TrackedEntry,
};
use crate::traits::{Entity, EntityId, PersistenceEngine, WriteOp};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

type IdentityKey = (&'static str, EntityId);

/// Tracked set of entity changes, committed together by [`save_changes`]
///
/// Not meant to be shared: every mutating call takes `&mut self`, and a
/// context is scoped to one logical operation.
///
/// [`save_changes`]: StoreContext::save_changes
#[derive(Debug)]
pub struct StoreContext {
    engine: Arc<dyn PersistenceEngine>,
    model: Arc<ModelRegistry>,
    clock: Arc<dyn Clock>,
    entries: Vec<TrackedEntry>,
    identity: HashMap<IdentityKey, EntryId>,
    interceptors: Vec<Arc<dyn SaveInterceptor>>,
    next_entry: u64,
}

impl StoreContext {
    pub fn new(
        engine: Arc<dyn PersistenceEngine>,
        model: Arc<ModelRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            model,
            clock,
            entries: Vec::new(),
            identity: HashMap::new(),
            interceptors: Vec::new(),
            next_entry: 1,
        }
    }

    pub fn engine(&self) -> &Arc<dyn PersistenceEngine> {
        &self.engine
    }

    pub fn model(&self) -> &ModelRegistry {
        &self.model
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Run an extra interceptor after the audit interceptor on every save
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn SaveInterceptor>) {
        self.interceptors.push(interceptor);
    }

    // ========================================
    // Tracking
    // ========================================

    /// Track a new entity; it is inserted on the next save
    pub fn add<T: Entity>(&mut self, entity: T) -> Result<EntryId, StoreError> {
        self.track(entity, EntityState::Added)
    }

    /// Track an entity already stored, without scheduling a write
    pub fn attach<T: Entity>(&mut self, entity: T) -> Result<EntryId, StoreError> {
        self.track(entity, EntityState::Unchanged)
    }

    /// Schedule an entity for update
    ///
    /// A tracked entry with the same key takes the new value. An entity
    /// without a key is added instead.
    pub fn update<T: Entity>(&mut self, entity: T) -> Result<EntryId, StoreError> {
        if let Some(entry_id) = self.tracked_id::<T>(entity.id()) {
            let position = self.position(entry_id)?;
            let entry = &mut self.entries[position];
            let state = match entry.state() {
                EntityState::Added => EntityState::Added,
                _ => EntityState::Modified,
            };
            Self::replace(entry, entity)?;
            entry.set_state(state);
            return Ok(entry_id);
        }

        let state = if entity.id() == 0 {
            EntityState::Added
        } else {
            EntityState::Modified
        };
        self.track(entity, state)
    }

    /// Schedule an entity for deletion
    ///
    /// Soft-deletable types are flagged rather than erased when saved.
    /// Removing an entity that was only added drops it from tracking.
    pub fn remove<T: Entity>(&mut self, entity: T) -> Result<EntryId, StoreError> {
        if let Some(entry_id) = self.tracked_id::<T>(entity.id()) {
            let position = self.position(entry_id)?;
            Self::replace(&mut self.entries[position], entity)?;
            self.remove_entry(entry_id)?;
            return Ok(entry_id);
        }

        if entity.id() == 0 {
            return Err(StoreError::NotFound(format!(
                "cannot remove an untracked {} without a key",
                T::table_name()
            )));
        }
        self.track(entity, EntityState::Deleted)
    }

    /// Schedule a tracked entry for deletion
    pub fn remove_entry(&mut self, entry_id: EntryId) -> Result<(), StoreError> {
        let position = self.position(entry_id)?;

        if self.entries[position].state() == EntityState::Added {
            self.detach_at(position);
        } else {
            self.entries[position].set_state(EntityState::Deleted);
        }
        Ok(())
    }

    /// Stop tracking an entry without writing anything
    pub fn detach(&mut self, entry_id: EntryId) -> Result<(), StoreError> {
        let position = self.position(entry_id)?;
        self.detach_at(position);
        Ok(())
    }

    pub fn entry<T: Entity>(&self, entry_id: EntryId) -> Option<&T> {
        self.entries
            .iter()
            .find(|entry| entry.id() == entry_id)
            .and_then(TrackedEntry::downcast::<T>)
    }

    /// Mutable access to a tracked entity; marks an unchanged entry modified
    pub fn entry_mut<T: Entity>(&mut self, entry_id: EntryId) -> Option<&mut T> {
        let entry = self.entries.iter_mut().find(|entry| entry.id() == entry_id)?;
        if entry.downcast::<T>().is_some() && entry.state() == EntityState::Unchanged {
            entry.set_state(EntityState::Modified);
        }
        entry.downcast_mut::<T>()
    }

    /// State of an entry; untracked entries are detached
    pub fn state(&self, entry_id: EntryId) -> EntityState {
        self.entries
            .iter()
            .find(|entry| entry.id() == entry_id)
            .map(TrackedEntry::state)
            .unwrap_or(EntityState::Detached)
    }

    /// Entries queued for the next save
    pub fn pending_changes(&self) -> Vec<&TrackedEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.state().is_pending())
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|entry| entry.state().is_pending())
    }

    pub fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    /// Forget every tracked entry, pending changes included
    pub fn clear(&mut self) {
        self.entries.clear();
        self.identity.clear();
    }

    fn track<T: Entity>(&mut self, mut entity: T, state: EntityState) -> Result<EntryId, StoreError> {
        self.model.model_of::<T>()?;
        Self::check_capabilities(&mut entity)?;

        let key = entity.id();
        if key != 0 && self.identity.contains_key(&(T::table_name(), key)) {
            return Err(StoreError::AlreadyTracked {
                table: T::table_name().to_string(),
                key,
            });
        }

        let entry_id = EntryId(self.next_entry);
        self.next_entry += 1;

        if key != 0 {
            self.identity.insert((T::table_name(), key), entry_id);
        }
        self.entries
            .push(TrackedEntry::new(entry_id, state, Box::new(entity)));

        debug!(table = T::table_name(), key, entry = %entry_id, ?state, "Tracking entity");
        Ok(entry_id)
    }

    /// Capability accessors must agree with the declared capability set
    fn check_capabilities<T: Entity>(entity: &mut T) -> Result<(), StoreError> {
        let declared = T::capabilities();
        if declared.is_soft_deletable() != entity.as_soft_deletable().is_some() {
            return Err(StoreError::configuration(
                T::table_name(),
                "soft-delete capability and accessor disagree",
            ));
        }
        if declared.is_time_tracked() != entity.as_time_tracked().is_some() {
            return Err(StoreError::configuration(
                T::table_name(),
                "time-tracking capability and accessor disagree",
            ));
        }
        Ok(())
    }

    fn replace<T: Entity>(entry: &mut TrackedEntry, entity: T) -> Result<(), StoreError> {
        let slot = entry
            .downcast_mut::<T>()
            .ok_or_else(|| StoreError::UnknownEntity(T::table_name().to_string()))?;
        *slot = entity;
        Ok(())
    }

    fn tracked_id<T: Entity>(&self, key: EntityId) -> Option<EntryId> {
        if key == 0 {
            return None;
        }
        self.identity.get(&(T::table_name(), key)).copied()
    }

    /// Entry id of a tracked entity, looked up by key
    pub fn entry_id_of<T: Entity>(&self, key: EntityId) -> Option<EntryId> {
        self.tracked_id::<T>(key)
    }

    fn position(&self, entry_id: EntryId) -> Result<usize, StoreError> {
        self.entries
            .iter()
            .position(|entry| entry.id() == entry_id)
            .ok_or_else(|| StoreError::NotFound(format!("entry {} is not tracked", entry_id)))
    }

    fn detach_at(&mut self, position: usize) {
        let entry = self.entries.remove(position);
        if entry.key() != 0 {
            self.identity.remove(&(entry.table(), entry.key()));
        }
    }

    // ========================================
    // Saving
    // ========================================

    /// Commit all pending changes as one batch
    ///
    /// Returns the number of rows written. If the engine rejects the batch
    /// the error is returned unchanged, nothing is persisted, and the
    /// entries keep their pending states along with any in-memory changes
    /// the interceptors made.
    pub async fn save_changes(&mut self) -> Result<usize, StoreError> {
        if !self.has_changes() {
            return Ok(0);
        }

        let now = self.clock.now();
        AuditInterceptor.saving_changes(&mut self.entries, now)?;
        for interceptor in &self.interceptors {
            debug!(interceptor = interceptor.name(), "Running save interceptor");
            interceptor.saving_changes(&mut self.entries, now)?;
        }
        if !self.interceptors.is_empty() {
            // Deletes or edits queued by custom interceptors still go through audit
            AuditInterceptor.saving_changes(&mut self.entries, now)?;
        }

        let mut positions = Vec::new();
        let mut batch: Vec<WriteOp> = Vec::new();
        for (position, entry) in self.entries.iter().enumerate() {
            if let Some(op) = entry.write_op()? {
                positions.push(position);
                batch.push(op);
            }
        }

        let keys = match self.engine.commit(&batch).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, operations = batch.len(), "Saving changes failed");
                return Err(e);
            }
        };

        self.accept_changes(&positions, &keys);

        info!(
            operations = batch.len(),
            provider = %self.engine.provider(),
            "Saved changes"
        );
        Ok(batch.len())
    }

    /// Write back generated keys and settle entry states after a commit
    fn accept_changes(&mut self, positions: &[usize], keys: &[Option<EntityId>]) {
        for (&position, key) in positions.iter().zip(keys) {
            let entry = &mut self.entries[position];
            if let Some(key) = key {
                entry.entity_mut().assign_key(*key);
                let entry_id = entry.id();
                let table = entry.table();
                self.identity.insert((table, *key), entry_id);
            }
        }

        let mut position = self.entries.len();
        while position > 0 {
            position -= 1;
            match self.entries[position].state() {
                EntityState::Added | EntityState::Modified => {
                    self.entries[position].set_state(EntityState::Unchanged)
                }
                EntityState::Deleted => self.detach_at(position),
                EntityState::Unchanged | EntityState::Detached => {}
            }
        }
    }

    // ========================================
    // Reading
    // ========================================

    /// Start a no-tracking query over `T`
    pub fn query<T: Entity>(&self) -> EntityQuery<'_, T> {
        EntityQuery::new(self)
    }

    /// Load one entity by key through the normal (filtered) read path
    pub async fn find<T: Entity>(&self, id: EntityId) -> Result<Option<T>, StoreError> {
        self.query::<T>().with_key(id).first().await
    }

    /// Load one entity by key and track it
    ///
    /// An entity already tracked under that key is returned as is.
    pub async fn find_tracked<T: Entity>(&mut self, id: EntityId) -> Result<Option<EntryId>, StoreError> {
        if let Some(entry_id) = self.tracked_id::<T>(id) {
            return Ok(Some(entry_id));
        }
        match self.find::<T>(id).await? {
            Some(entity) => self.attach(entity).map(Some),
            None => Ok(None),
        }
    }

    /// Track query results, reusing entries for keys already tracked
    pub fn attach_range<T: Entity>(&mut self, entities: Vec<T>) -> Result<Vec<EntryId>, StoreError> {
        entities
            .into_iter()
            .map(|entity| match self.tracked_id::<T>(entity.id()) {
                Some(entry_id) => Ok(entry_id),
                None => self.attach(entity),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::MemoryEngine;
    use crate::test_support::{manual_clock, t0, Lecture, Lecturer, Memo, Unflagged};
    use crate::traits::TableSchema;
    use chrono::Duration;

    fn registry() -> Arc<ModelRegistry> {
        let mut registry = ModelRegistry::new();
        registry
            .register::<Lecturer>()
            .unwrap()
            .register::<Lecture>()
            .unwrap()
            .register::<Memo>()
            .unwrap();
        Arc::new(registry)
    }

    async fn context() -> (StoreContext, ManualClock) {
        let engine = MemoryEngine::new();
        engine.ensure_table(&TableSchema::of::<Lecturer>()).await.unwrap();
        engine.ensure_table(&TableSchema::of::<Lecture>()).await.unwrap();
        engine.ensure_table(&TableSchema::of::<Memo>()).await.unwrap();
        let clock = manual_clock();
        let context = StoreContext::new(Arc::new(engine), registry(), Arc::new(clock.clone()));
        (context, clock)
    }

    #[tokio::test]
    async fn save_assigns_keys_and_accepts_changes() {
        let (mut context, _) = context().await;

        let ada = context.add(Lecturer::new("Ada")).unwrap();
        let memo = context.add(Memo { id: 0, text: None }).unwrap();
        assert_eq!(context.pending_changes().len(), 2);

        assert_eq!(context.save_changes().await.unwrap(), 2);

        assert_eq!(context.entry::<Lecturer>(ada).unwrap().id, 1);
        assert_eq!(context.entry::<Memo>(memo).unwrap().id, 1);
        assert_eq!(context.state(ada), EntityState::Unchanged);
        assert!(!context.has_changes());
        assert_eq!(context.entry_id_of::<Lecturer>(1), Some(ada));
        assert_eq!(context.save_changes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn soft_delete_keeps_the_row_and_the_entry() {
        let (mut context, clock) = context().await;
        let ada = context.add(Lecturer::new("Ada")).unwrap();
        context.save_changes().await.unwrap();

        clock.advance(Duration::minutes(1));
        context.remove_entry(ada).unwrap();
        context.save_changes().await.unwrap();

        assert_eq!(context.state(ada), EntityState::Unchanged);
        let saved = context.entry::<Lecturer>(ada).unwrap();
        assert!(saved.is_deleted);
        assert_eq!(saved.created_at, t0());
        assert_eq!(saved.updated_at, t0() + Duration::minutes(1));

        assert!(context.find::<Lecturer>(1).await.unwrap().is_none());
        let removed = context.query::<Lecturer>().include_removed().to_list().await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(removed[0].is_deleted);
    }

    #[tokio::test]
    async fn hard_delete_detaches_the_entry() {
        let (mut context, _) = context().await;
        let memo = context.add(Memo { id: 0, text: Some("x".into()) }).unwrap();
        context.save_changes().await.unwrap();

        context.remove_entry(memo).unwrap();
        assert_eq!(context.state(memo), EntityState::Deleted);
        context.save_changes().await.unwrap();

        assert_eq!(context.state(memo), EntityState::Detached);
        assert_eq!(context.query::<Memo>().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn removing_an_added_entity_detaches_it() {
        let (mut context, _) = context().await;
        let memo = context.add(Memo { id: 0, text: None }).unwrap();

        context.remove_entry(memo).unwrap();

        assert_eq!(context.state(memo), EntityState::Detached);
        assert!(!context.has_changes());
    }

    #[tokio::test]
    async fn update_and_remove_resolve_by_key() {
        let (mut context, _) = context().await;
        let ada = context.add(Lecturer::new("Ada")).unwrap();
        context.save_changes().await.unwrap();

        let mut renamed = context.entry::<Lecturer>(ada).unwrap().clone();
        renamed.name = "Ada Lovelace".to_string();
        assert_eq!(context.update(renamed.clone()).unwrap(), ada);
        assert_eq!(context.state(ada), EntityState::Modified);
        context.save_changes().await.unwrap();
        assert_eq!(
            context.find::<Lecturer>(1).await.unwrap().unwrap().name,
            "Ada Lovelace"
        );

        assert_eq!(context.remove(renamed).unwrap(), ada);
        assert_eq!(context.state(ada), EntityState::Deleted);
    }

    #[tokio::test]
    async fn untracked_updates_and_removes() {
        let (mut context, _) = context().await;
        context.add(Memo { id: 0, text: None }).unwrap();
        context.save_changes().await.unwrap();
        context.clear();

        let entry = context.update(Memo { id: 1, text: Some("edited".into()) }).unwrap();
        assert_eq!(context.state(entry), EntityState::Modified);
        context.save_changes().await.unwrap();
        assert_eq!(
            context.find::<Memo>(1).await.unwrap().unwrap().text.as_deref(),
            Some("edited")
        );

        let added = context.update(Memo { id: 0, text: None }).unwrap();
        assert_eq!(context.state(added), EntityState::Added);

        assert!(matches!(
            context.remove(Memo { id: 0, text: None }),
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn identity_conflicts_are_rejected() {
        let (mut context, _) = context().await;
        context.attach(Memo { id: 3, text: None }).unwrap();

        let err = context.attach(Memo { id: 3, text: None }).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyTracked { key: 3, .. }));
    }

    #[tokio::test]
    async fn unregistered_types_cannot_be_tracked() {
        let (mut context, _) = context().await;

        let err = context.add(Unflagged { id: 0, removed: false }).unwrap_err();
        assert!(matches!(err, StoreError::UnknownEntity(_)));
    }

    #[tokio::test]
    async fn failed_commit_keeps_pending_states() {
        let (mut context, _) = context().await;
        let lecture = context
            .add(Lecture { id: 0, title: "Logic".into(), lecturer_id: 42 })
            .unwrap();
        let ada = context.add(Lecturer::new("Ada")).unwrap();

        let err = context.save_changes().await.unwrap_err();

        assert!(matches!(err, StoreError::Constraint { .. }));
        assert_eq!(context.state(lecture), EntityState::Added);
        assert_eq!(context.state(ada), EntityState::Added);
        // Interceptor changes stay in memory
        assert_eq!(context.entry::<Lecturer>(ada).unwrap().created_at, t0());
        assert_eq!(context.query::<Lecturer>().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn entry_mut_marks_modified() {
        let (mut context, clock) = context().await;
        let ada = context.add(Lecturer::new("Ada")).unwrap();
        context.save_changes().await.unwrap();

        clock.advance(Duration::seconds(30));
        context.entry_mut::<Lecturer>(ada).unwrap().name = "Countess".into();
        assert_eq!(context.state(ada), EntityState::Modified);
        context.save_changes().await.unwrap();

        let stored = context.find::<Lecturer>(1).await.unwrap().unwrap();
        assert_eq!(stored.name, "Countess");
        assert_eq!(stored.created_at, t0());
        assert_eq!(stored.updated_at, t0() + Duration::seconds(30));
    }

    #[tokio::test]
    async fn find_tracked_reuses_entries() {
        let (mut context, _) = context().await;
        context.add(Lecturer::new("Ada")).unwrap();
        context.save_changes().await.unwrap();
        context.clear();

        let first = context.find_tracked::<Lecturer>(1).await.unwrap().unwrap();
        let second = context.find_tracked::<Lecturer>(1).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(context.entries().len(), 1);
        assert!(context.find_tracked::<Lecturer>(9).await.unwrap().is_none());

        let loaded = context.query::<Lecturer>().to_list().await.unwrap();
        assert_eq!(context.attach_range(loaded).unwrap(), vec![first]);
    }

    #[derive(Debug)]
    struct RejectAll;

    impl SaveInterceptor for RejectAll {
        fn name(&self) -> &'static str {
            "reject_all"
        }

        fn saving_changes(&self, _: &mut [TrackedEntry], _: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError> {
            Err(StoreError::Unsupported("read-only context".into()))
        }
    }

    #[tokio::test]
    async fn custom_interceptors_run_after_audit() {
        let (mut context, _) = context().await;
        context.add_interceptor(Arc::new(RejectAll));
        context.add(Memo { id: 0, text: None }).unwrap();

        let err = context.save_changes().await.unwrap_err();

        assert!(matches!(err, StoreError::Unsupported(_)));
        assert_eq!(context.query::<Memo>().count().await.unwrap(), 0);
    }

    /// Retires every lecturer still tracked as unchanged
    #[derive(Debug)]
    struct RetireLecturers;

    impl SaveInterceptor for RetireLecturers {
        fn name(&self) -> &'static str {
            "retire_lecturers"
        }

        fn saving_changes(&self, entries: &mut [TrackedEntry], _: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError> {
            for entry in entries.iter_mut() {
                if entry.table() == "lecturers" && entry.state() == EntityState::Unchanged {
                    entry.set_state(EntityState::Deleted);
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn deletes_queued_by_interceptors_stay_soft() {
        let (mut context, clock) = context().await;
        let ada = context.add(Lecturer::new("Ada")).unwrap();
        context.save_changes().await.unwrap();

        context.add_interceptor(Arc::new(RetireLecturers));
        clock.advance(Duration::minutes(5));
        context.add(Memo { id: 0, text: Some("trigger".into()) }).unwrap();
        context.save_changes().await.unwrap();

        assert_eq!(context.state(ada), EntityState::Unchanged);
        let retired = context.entry::<Lecturer>(ada).unwrap();
        assert!(retired.is_deleted);
        assert_eq!(retired.updated_at, t0() + Duration::minutes(5));

        let stored = context.query::<Lecturer>().include_removed().to_list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_deleted);
        assert!(context.find::<Lecturer>(1).await.unwrap().is_none());
    }
}
