//! # unistore
//!
//! A unit of work over PostgreSQL or in-memory storage. Entities opt into
//! soft delete and audit timestamps through capability traits; the pending
//! changes of every save are rewritten before commit so that deletes become
//! flag updates and timestamps are stamped from one clock reading, and
//! default reads skip removed rows.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use unistore::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::new(DatabaseConfig::memory(), TrackingConfig::default());
//!
//!     let store = UniStore::new(&config).await?;
//!     store.ensure_created().await?;
//!
//!     let mut context = store.context();
//!     let john = context.add(Student::new("John", 21))?;
//!     context.save_changes().await?;
//!
//!     // Soft delete: the row stays, flagged
//!     context.remove_entry(john)?;
//!     context.save_changes().await?;
//!
//!     assert_eq!(context.query::<Student>().count().await?, 0);
//!     assert_eq!(context.query::<Student>().include_removed().count().await?, 1);
//!
//!     Ok(())
//! }
//! ```

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

pub mod core;
pub mod errors;
pub mod migration;
pub mod prelude;
pub mod university;

// Re-export the main public types for convenience
pub use core::UniStore;
pub use errors::UniStoreError;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, DbProvider, TrackingConfig};

// Re-export internal crates used by the public API
pub use store_object;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
