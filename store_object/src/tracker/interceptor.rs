//! Pre-commit interception
//!
//! Runs over the pending entries of a unit of work right before they are
//! serialized into write operations. The audit pass turns deletes of
//! soft-deletable entities into flag updates and stamps audit timestamps.

use crate::errors::StoreError;
use crate::tracker::entry::{EntityState, TrackedEntry};
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use tracing::debug;

/// Counts of what one interception pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterceptOutcome {
    /// Deletes rewritten to flag updates
    pub soft_deleted: usize,
    /// Entries that received timestamps
    pub stamped: usize,
}

/// Apply the soft-delete rewrite and audit timestamps to pending entries
///
/// Entries that are not pending are skipped. The soft-delete rewrite runs
/// before timestamping, so a delete turned into an update is stamped too.
/// Running the pass again with the same `now` leaves entries as they are.
pub fn intercept_pending_changes(entries: &mut [TrackedEntry], now: DateTime<Utc>) -> InterceptOutcome {
    let mut outcome = InterceptOutcome::default();

    for entry in entries.iter_mut().filter(|entry| entry.state().is_pending()) {
        let mut state = entry.state();

        if let Some(flag) = entry.entity_mut().soft_deletable() {
            match state {
                EntityState::Added => flag.set_removed(false),
                EntityState::Deleted => {
                    flag.set_removed(true);
                    state = EntityState::Modified;
                    outcome.soft_deleted += 1;
                }
                _ => {}
            }
        }
        entry.set_state(state);

        if let Some(stamps) = entry.entity_mut().time_tracked() {
            stamps.set_updated_at(now);
            if state == EntityState::Added {
                stamps.set_created_at(now);
            }
            outcome.stamped += 1;
        }

        debug!(
            table = entry.table(),
            key = entry.key(),
            operation = ?entry.operation(),
            "Intercepted pending change"
        );
    }

    outcome
}

/// Hook into the commit pipeline of a store context
///
/// Interceptors see every tracked entry and may change entities or their
/// states. Returning an error aborts the save before anything reaches the
/// engine.
pub trait SaveInterceptor: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn saving_changes(&self, entries: &mut [TrackedEntry], now: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Soft delete and audit timestamps; always the first interceptor to run
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditInterceptor;

impl SaveInterceptor for AuditInterceptor {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn saving_changes(&self, entries: &mut [TrackedEntry], now: DateTime<Utc>) -> Result<(), StoreError> {
        let outcome = intercept_pending_changes(entries, now);
        debug!(
            soft_deleted = outcome.soft_deleted,
            stamped = outcome.stamped,
            "Audit interceptor applied"
        );
        Ok(())
    }
}
