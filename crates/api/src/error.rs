use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use automl_core::error::CoreError;
use automl_db::DbError;
use automl_pipeline::FeasibilityError;
use serde_json::json;

use crate::engine::dispatcher::DispatchError;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce `{"error": ..., "code": ...}`
/// bodies with a status code per failure kind.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `automl_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] DbError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Store(DbError::Core(core)) => classify_core_error(core),
            AppError::Store(DbError::Database(err)) => {
                tracing::error!(error = %err, "Database error");
                internal()
            }

            AppError::Dispatch(dispatch) => match dispatch {
                DispatchError::Infeasible(FeasibilityError::InputNotFound(_)) => (
                    StatusCode::NOT_FOUND,
                    "INPUT_NOT_FOUND",
                    dispatch.to_string(),
                ),
                DispatchError::Infeasible(FeasibilityError::InvalidTarget(msg)) => {
                    (StatusCode::BAD_REQUEST, "INVALID_TARGET", msg.clone())
                }
                DispatchError::QueueUnavailable { .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "QUEUE_UNAVAILABLE",
                    "The job was recorded but could not be queued".to_string(),
                ),
                DispatchError::Store(DbError::Core(core)) => classify_core_error(core),
                DispatchError::Store(DbError::Database(err)) => {
                    tracing::error!(error = %err, "Database error during dispatch");
                    internal()
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, "INVALID_TRANSITION", core.to_string())
        }
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
