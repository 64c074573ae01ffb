//! Handlers for the `/jobs` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use automl_core::status::JobStatus;
use automl_core::types::JobId;
use automl_db::JobStore;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /api/v1/jobs`.
///
/// `filename` and `target_col` are accepted as aliases.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitJobRequest {
    #[serde(alias = "filename")]
    #[validate(length(min = 1, max = 255, message = "input_reference must not be empty"))]
    pub input_reference: String,

    #[serde(alias = "target_col")]
    #[validate(length(min = 1, max = 255, message = "target_spec must not be empty"))]
    pub target_spec: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Check the submission, record a `pending` job and queue it. Returns 201
/// without waiting for execution.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<SubmitJobRequest>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let job_id = state
        .dispatcher
        .submit(&input.input_reference, &input.target_spec)
        .await?;

    let body = SubmitJobResponse {
        job_id,
        status: JobStatus::Pending,
        message: "Training job queued.".to_string(),
    };
    Ok((StatusCode::CREATED, Json(DataResponse { data: body })))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// Current snapshot of a job. Clients that missed the live stream use this
/// to learn the outcome.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.get(job_id).await?;
    Ok(Json(DataResponse {
        data: job.snapshot()?,
    }))
}
