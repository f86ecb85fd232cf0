//! Core UniStore functionality
//!
//! This module contains the main UniStore struct and its implementation,
//! providing provider selection and the shared pieces every unit of work
//! is built from: the engine, the entity model and the clock.

use sqlx::PgPool;
use std::sync::Arc;
use store_object::{
    Clock, MemoryEngine, ModelRegistry, PersistenceEngine, PgEngine, StoreContext, SystemClock,
};
use tracing::info;

use crate::errors::UniStoreError;
use crate::university::{self, StudentNameRule, UniversityUnitOfWork};
use config::{AppConfig, DbProvider, TrackingConfig};

/// Main UniStore coordinator owning the engine and the university model
#[derive(Debug, Clone)]
pub struct UniStore {
    engine: Arc<dyn PersistenceEngine>,
    pool: Option<PgPool>,
    model: Arc<ModelRegistry>,
    clock: Arc<dyn Clock>,
    index_soft_delete_columns: bool,
}

impl UniStore {
    /// Create new UniStore, connecting to the configured provider
    pub async fn new(config: &AppConfig) -> Result<Self, UniStoreError> {
        config.validate()?;

        let (engine, pool): (Arc<dyn PersistenceEngine>, Option<PgPool>) =
            match config.database.provider {
                DbProvider::Postgres => {
                    let engine = PgEngine::connect(&config.database).await?;
                    let pool = engine.pool().clone();
                    (Arc::new(engine), Some(pool))
                }
                DbProvider::Memory => (Arc::new(MemoryEngine::new()), None),
            };

        info!(
            provider = %config.database.provider,
            precision = config.tracking.timestamp_precision,
            "UniStore ready"
        );

        Ok(Self {
            engine,
            pool,
            model: Arc::new(university::model()?),
            clock: Arc::new(SystemClock::new(config.tracking.timestamp_precision)),
            index_soft_delete_columns: config.tracking.index_soft_delete_columns,
        })
    }

    /// In-memory store with default tracking settings
    pub fn in_memory() -> Result<Self, UniStoreError> {
        Self::from_engine(Arc::new(MemoryEngine::new()), &TrackingConfig::default())
    }

    /// Store over an engine built by the caller
    pub fn from_engine(
        engine: Arc<dyn PersistenceEngine>,
        tracking: &TrackingConfig,
    ) -> Result<Self, UniStoreError> {
        Ok(Self {
            engine,
            pool: None,
            model: Arc::new(university::model()?),
            clock: Arc::new(SystemClock::new(tracking.timestamp_precision)),
            index_soft_delete_columns: tracking.index_soft_delete_columns,
        })
    }

    /// Replace the clock used to stamp audit timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Open a fresh unit of work with the university save rules installed
    pub fn context(&self) -> StoreContext {
        let mut context = StoreContext::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.model),
            Arc::clone(&self.clock),
        );
        context.add_interceptor(Arc::new(StudentNameRule));
        context
    }

    /// Repository-style unit of work over a fresh context
    pub fn unit_of_work(&self) -> UniversityUnitOfWork {
        UniversityUnitOfWork::new(self.context())
    }

    pub fn engine(&self) -> &Arc<dyn PersistenceEngine> {
        &self.engine
    }

    pub fn model(&self) -> &ModelRegistry {
        &self.model
    }

    pub fn provider(&self) -> DbProvider {
        self.engine.provider()
    }

    /// Get database pool reference, when backed by PostgreSQL
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub(crate) fn index_soft_delete_columns(&self) -> bool {
        self.index_soft_delete_columns
    }

    /// Check database connection health
    pub async fn health_check(&self) -> Result<(), UniStoreError> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").fetch_one(pool).await?;
        }
        Ok(())
    }
}
