//! Schema creation and teardown
//!
//! Tables are created in registration order, so every foreign key target
//! exists before the tables pointing at it, and dropped in reverse.

use crate::core::UniStore;
use crate::errors::UniStoreError;
use store_object::TableSchema;
use tracing::info;

impl UniStore {
    /// Create every registered table that does not exist yet
    ///
    /// Soft-delete columns get an index when `index_soft_delete_columns` is
    /// set, since every default read filters on them.
    pub async fn ensure_created(&self) -> Result<(), UniStoreError> {
        for model in self.model().models() {
            let schema: &TableSchema = model.schema();
            self.engine().ensure_table(schema).await?;
            info!(table = schema.name, "Table ensured");
        }

        if self.index_soft_delete_columns() {
            for (table, column) in self.model().soft_delete_columns() {
                self.engine().create_index(table, column).await?;
                info!(table, column, "Soft-delete index ensured");
            }
        }

        Ok(())
    }

    /// Drop every registered table, dependents first
    pub async fn ensure_deleted(&self) -> Result<(), UniStoreError> {
        for model in self.model().models().rev() {
            self.engine().drop_table(model.table()).await?;
            info!(table = model.table(), "Table dropped");
        }
        Ok(())
    }

    /// Drop and recreate the whole schema
    pub async fn recreate(&self) -> Result<(), UniStoreError> {
        self.ensure_deleted().await?;
        self.ensure_created().await
    }
}
