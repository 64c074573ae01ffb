//! The job record store: the single source of truth for job outcomes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use automl_core::error::CoreError;
use automl_core::lifecycle::Transition;
use automl_core::types::JobId;
use tokio::sync::{Mutex, RwLock};

use crate::error::DbError;
use crate::models::job::Job;
use crate::repositories::JobRepo;
use crate::DbPool;

/// Durable job state keyed by job id.
///
/// Every operation is atomic per id, and operations on different ids do
/// not block each other.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails with `CoreError::Conflict` if the id exists.
    async fn create(&self, job: &Job) -> Result<(), DbError>;

    /// Fetch a job, or `CoreError::NotFound`.
    async fn get(&self, id: JobId) -> Result<Job, DbError>;

    /// Apply a lifecycle transition and return the updated job.
    ///
    /// Fails with `CoreError::InvalidTransition` when the transition would
    /// break the `pending -> running -> {done | error}` order.
    async fn update(&self, id: JobId, transition: &Transition) -> Result<Job, DbError>;

    /// Check that the backing storage is reachable.
    async fn ping(&self) -> Result<(), DbError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// PostgreSQL-backed store. Connections are taken from the pool per call.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &Job) -> Result<(), DbError> {
        JobRepo::create(&self.pool, job).await
    }

    async fn get(&self, id: JobId) -> Result<Job, DbError> {
        JobRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound { entity: "Job", id }.into())
    }

    async fn update(&self, id: JobId, transition: &Transition) -> Result<Job, DbError> {
        JobRepo::transition(&self.pool, id, transition).await
    }

    async fn ping(&self) -> Result<(), DbError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-process store for tests and single-process setups.
///
/// The outer map lock is held only long enough to find a job's slot; the
/// transition itself runs under that job's own mutex.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: JobId) -> Result<Arc<Mutex<Job>>, DbError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound { entity: "Job", id }.into())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> Result<(), DbError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(CoreError::Conflict(format!("Job {} already exists", job.id)).into());
        }
        jobs.insert(job.id, Arc::new(Mutex::new(job.clone())));
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Job, DbError> {
        let slot = self.slot(id).await?;
        let job = slot.lock().await.clone();
        Ok(job)
    }

    async fn update(&self, id: JobId, transition: &Transition) -> Result<Job, DbError> {
        let slot = self.slot(id).await?;
        let mut job = slot.lock().await;
        job.apply(transition, chrono::Utc::now())?;
        Ok(job.clone())
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}
