//! Traits for persisted entities
//!
//! This module contains the entity metadata trait, the capability contracts
//! entities can opt into, and the engine interface commits are delegated to.

pub mod engine;
pub mod entity;
pub mod soft_deletable;
pub mod time_tracked;

// Re-export all public items for convenience
pub use engine::{PersistenceEngine, WriteOp};
pub use entity::{Capabilities, Column, Entity, EntityId, TableSchema, TimestampColumns};
pub use soft_deletable::SoftDeletable;
pub use time_tracked::TimeTracked;
