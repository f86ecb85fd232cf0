//! Store Object - persistence layer for unistore
//!
//! This crate provides the entity capability traits, the unit of work with
//! its pre-commit interceptor pipeline, the implicit filter registry, query
//! builders and the persistence engines (PostgreSQL and in-memory).

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod clock;
pub mod context;
pub mod engine;
pub mod errors;
pub mod model;
pub mod prelude;
pub mod query_builder;
pub mod repository;
pub mod tracker;
pub mod traits;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{EntityQuery, RawQuery, StoreContext};
pub use engine::{MemoryEngine, PgEngine};
pub use errors::StoreError;
pub use model::{EntityModel, ModelRegistry};
pub use query_builder::{QueryBuilder, QueryFilter, QueryOperator, SortOrder, UpdateSet};
pub use repository::{GenericRepository, Repository};
pub use tracker::{
    intercept_pending_changes, AuditInterceptor, EntityState, EntryId, SaveInterceptor,
    TrackedEntry,
};
pub use traits::*;
pub use validation::{
    check_identifier, IdentifierKind, ValidatedFieldName, ValidatedTableName, ValidationError,
};
