//! Job record model and the snapshot returned by the status endpoint.

use automl_core::error::CoreError;
use automl_core::lifecycle::{next_status, Transition};
use automl_core::status::{JobStatus, StatusId};
use automl_core::types::{JobId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `jobs` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Job {
    pub id: JobId,
    pub input_reference: String,
    pub target_spec: String,
    pub status_id: StatusId,
    pub problem_kind: Option<String>,
    pub result_payload: Option<serde_json::Value>,
    pub error_detail: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Build a fresh `pending` job.
    pub fn new_pending(
        id: JobId,
        input_reference: impl Into<String>,
        target_spec: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            input_reference: input_reference.into(),
            target_spec: target_spec.into(),
            status_id: JobStatus::Pending.id(),
            problem_kind: None,
            result_payload: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> Result<JobStatus, CoreError> {
        JobStatus::try_from(self.status_id)
    }

    /// Apply a lifecycle transition in place.
    ///
    /// The job is left untouched when the transition is rejected.
    /// `updated_at` never moves backwards, even if `now` lags behind a
    /// previous write from another host.
    pub fn apply(&mut self, transition: &Transition, now: Timestamp) -> Result<(), CoreError> {
        let next = next_status(self.status()?, transition)?;

        match transition {
            Transition::Start => {}
            Transition::Complete {
                result,
                problem_kind,
            } => {
                self.result_payload = Some(result.clone());
                if let Some(kind) = problem_kind {
                    self.problem_kind = Some(kind.to_string());
                }
            }
            Transition::Fail { detail } => {
                self.error_detail = Some(detail.clone());
            }
        }

        self.status_id = next.id();
        self.updated_at = now.max(self.updated_at);
        Ok(())
    }

    pub fn snapshot(&self) -> Result<JobSnapshot, CoreError> {
        Ok(JobSnapshot {
            job_id: self.id,
            status: self.status()?,
            problem_kind: self.problem_kind.clone(),
            result_payload: self.result_payload.clone(),
            error_detail: self.error_detail.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Response body for `GET /api/v1/jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub problem_kind: Option<String>,
    pub result_payload: Option<serde_json::Value>,
    pub error_detail: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
