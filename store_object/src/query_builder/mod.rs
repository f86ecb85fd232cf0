//! Query builder utilities
//!
//! Filters, ordering and bulk-update descriptions shared by both engines.

pub mod builder;
pub mod evaluate;
pub mod filter;
pub mod ordering;
pub mod sql_generation;
pub mod update;

#[cfg(test)]
mod tests;

pub use builder::QueryBuilder;
pub use filter::{LogicalOperator, QueryCondition, QueryFilter, QueryOperator};
pub use ordering::SortOrder;
pub use sql_generation::{BoundValue, SqlGenerator};
pub use update::{UpdateOperation, UpdateSet};
