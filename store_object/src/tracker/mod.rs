//! Change tracking and the pre-commit interceptor pipeline

pub mod entry;
pub mod interceptor;

pub use entry::{EntityState, EntryId, Operation, TrackedEntity, TrackedEntry};
pub use interceptor::{intercept_pending_changes, AuditInterceptor, InterceptOutcome, SaveInterceptor};
