//! Job submission.
//!
//! The feasibility check runs before anything is written, so a rejected
//! submission leaves no trace. Once the record exists the job is queued and
//! its id returned without waiting for execution.

use std::sync::Arc;

use automl_core::types::{new_job_id, JobId};
use automl_db::models::job::Job;
use automl_db::models::work_item::WorkItem;
use automl_db::{DbError, JobStore, QueueError, WorkQueue};
use automl_pipeline::{FeasibilityError, InputCatalog};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The input or target failed the feasibility check; no job exists.
    #[error(transparent)]
    Infeasible(#[from] FeasibilityError),

    /// The job was recorded but could not be queued. The record stays
    /// `pending`.
    #[error("Job {job_id} could not be queued: {source}")]
    QueueUnavailable {
        job_id: JobId,
        #[source]
        source: QueueError,
    },

    #[error(transparent)]
    Store(#[from] DbError),
}

/// Accepts submissions and hands them to the work queue.
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    catalog: Arc<dyn InputCatalog>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        catalog: Arc<dyn InputCatalog>,
    ) -> Self {
        Self {
            store,
            queue,
            catalog,
        }
    }

    /// Check, record and queue a job. Returns its id.
    pub async fn submit(
        &self,
        input_reference: &str,
        target_spec: &str,
    ) -> Result<JobId, DispatchError> {
        self.catalog
            .check_target(input_reference, target_spec)
            .await?;

        let job_id = new_job_id();
        let job = Job::new_pending(job_id, input_reference, target_spec, chrono::Utc::now());
        self.store.create(&job).await?;

        let item = WorkItem {
            job_id,
            input_reference: input_reference.to_string(),
            target_spec: target_spec.to_string(),
        };
        if let Err(source) = self.queue.enqueue(&item).await {
            tracing::error!(%job_id, error = %source, "Enqueue failed, job left pending");
            return Err(DispatchError::QueueUnavailable { job_id, source });
        }

        tracing::info!(%job_id, input_reference, target_spec, "Job queued");
        Ok(job_id)
    }
}
