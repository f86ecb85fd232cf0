//! Convenience re-exports for common store-object usage

// Capability and metadata traits
pub use crate::traits::{
    Capabilities, Column, Entity, EntityId, PersistenceEngine, SoftDeletable, TimeTracked,
};

// Error types
pub use crate::errors::StoreError;

// Unit of work
pub use crate::context::{EntityQuery, RawQuery, StoreContext};
pub use crate::tracker::{EntityState, EntryId, SaveInterceptor, TrackedEntry};

// Model setup
pub use crate::model::ModelRegistry;

// Repository
pub use crate::repository::{GenericRepository, Repository};

// Query building
pub use crate::query_builder::{QueryFilter, SortOrder, UpdateSet};

// Clocks
pub use crate::clock::{Clock, ManualClock, SystemClock};

// Common external dependencies that are frequently used
pub use async_trait::async_trait;
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
