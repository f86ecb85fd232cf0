//! Repository-style access to the university tables
//!
//! Changes made through the repositories stay pending until
//! [`UniversityUnitOfWork::complete`] saves them in one commit. Dropping the
//! unit of work without completing it discards them.

use store_object::{GenericRepository, StoreContext, StoreError};
use tracing::info;

use super::entities::{Course, Student};

#[derive(Debug)]
pub struct UniversityUnitOfWork {
    context: StoreContext,
}

impl UniversityUnitOfWork {
    pub fn new(context: StoreContext) -> Self {
        Self { context }
    }

    pub fn students(&mut self) -> GenericRepository<'_, Student> {
        GenericRepository::new(&mut self.context)
    }

    pub fn courses(&mut self) -> GenericRepository<'_, Course> {
        GenericRepository::new(&mut self.context)
    }

    pub fn context(&self) -> &StoreContext {
        &self.context
    }

    pub fn has_changes(&self) -> bool {
        self.context.has_changes()
    }

    /// Save every pending change and close the unit of work
    pub async fn complete(mut self) -> Result<usize, StoreError> {
        let written = self.context.save_changes().await?;
        info!(written, "University unit of work completed");
        Ok(written)
    }
}
