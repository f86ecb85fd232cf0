//! Convenience re-exports for common unistore usage
//!
//! # Example
//!
//! ```rust
//! use unistore::prelude::*;
//!
//! // UniStore, the store-object unit of work and the university model
//! ```

// Core UniStore components
pub use crate::core::UniStore;
pub use crate::errors::UniStoreError;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, DbProvider, TrackingConfig};

// Re-export commonly used store-object types for convenience
pub use store_object::prelude::*;

// University model
pub use crate::university::{
    queries, Course, CourseEnrollment, Enrollment, Note, Seeded, Student, StudentAddress,
    StudentCourse, UniversityUnitOfWork,
};

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use sqlx;
pub use tokio;
