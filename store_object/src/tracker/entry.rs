//! Tracked entries of a unit of work

use crate::errors::StoreError;
use crate::traits::{
    Capabilities, Entity, EntityId, SoftDeletable, TableSchema, TimeTracked, WriteOp,
};
use serde_json::Value;
use std::any::Any;
use std::fmt;

/// Handle to an entry inside one [`StoreContext`](crate::context::StoreContext)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Change-tracking state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// New, will be inserted
    Added,
    /// Matches what was last loaded or saved
    Unchanged,
    /// Will be written as an update
    Modified,
    /// Will be deleted
    Deleted,
    /// No longer tracked
    Detached,
}

impl EntityState {
    /// The write this state asks for at commit time
    pub fn operation(&self) -> Option<Operation> {
        match self {
            EntityState::Added => Some(Operation::Insert),
            EntityState::Modified => Some(Operation::Update),
            EntityState::Deleted => Some(Operation::Delete),
            EntityState::Unchanged | EntityState::Detached => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.operation().is_some()
    }
}

/// Intended operation of a pending entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Type-erased view of an entity, used by the commit pipeline
pub trait TrackedEntity: Send + Sync + fmt::Debug {
    fn table(&self) -> &'static str;

    fn schema(&self) -> TableSchema;

    fn key(&self) -> EntityId;

    fn assign_key(&mut self, key: EntityId);

    fn capability_set(&self) -> Capabilities;

    fn soft_deletable(&mut self) -> Option<&mut dyn SoftDeletable>;

    fn time_tracked(&mut self) -> Option<&mut dyn TimeTracked>;

    /// Serialized storage row
    fn to_row(&self) -> Result<Value, StoreError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> TrackedEntity for T {
    fn table(&self) -> &'static str {
        T::table_name()
    }

    fn schema(&self) -> TableSchema {
        TableSchema::of::<T>()
    }

    fn key(&self) -> EntityId {
        self.id()
    }

    fn assign_key(&mut self, key: EntityId) {
        self.set_id(key);
    }

    fn capability_set(&self) -> Capabilities {
        <T as Entity>::capabilities()
    }

    fn soft_deletable(&mut self) -> Option<&mut dyn SoftDeletable> {
        self.as_soft_deletable()
    }

    fn time_tracked(&mut self) -> Option<&mut dyn TimeTracked> {
        self.as_time_tracked()
    }

    fn to_row(&self) -> Result<Value, StoreError> {
        serde_json::to_value(self).map_err(|e| StoreError::serialization(T::table_name(), e))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One entity together with its tracking state
#[derive(Debug)]
pub struct TrackedEntry {
    id: EntryId,
    state: EntityState,
    entity: Box<dyn TrackedEntity>,
}

impl TrackedEntry {
    pub(crate) fn new(id: EntryId, state: EntityState, entity: Box<dyn TrackedEntity>) -> Self {
        Self { id, state, entity }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Change the intended write of this entry
    pub fn set_state(&mut self, state: EntityState) {
        self.state = state;
    }

    pub fn operation(&self) -> Option<Operation> {
        self.state.operation()
    }

    pub fn table(&self) -> &'static str {
        self.entity.table()
    }

    pub fn key(&self) -> EntityId {
        self.entity.key()
    }

    pub fn entity(&self) -> &dyn TrackedEntity {
        self.entity.as_ref()
    }

    pub fn entity_mut(&mut self) -> &mut dyn TrackedEntity {
        self.entity.as_mut()
    }

    pub fn downcast<T: Entity>(&self) -> Option<&T> {
        self.entity.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.entity.as_any_mut().downcast_mut::<T>()
    }

    /// Serialize the pending write, if any
    pub fn write_op(&self) -> Result<Option<WriteOp>, StoreError> {
        let schema = self.entity.schema();
        let op = match self.operation() {
            None => return Ok(None),
            Some(Operation::Insert) => WriteOp::Insert {
                schema,
                row: self.entity.to_row()?,
            },
            Some(Operation::Update) => WriteOp::Update {
                schema,
                key: self.key(),
                row: self.entity.to_row()?,
            },
            Some(Operation::Delete) => WriteOp::Delete {
                schema,
                key: self.key(),
            },
        };
        Ok(Some(op))
    }
}
