//! Job lifecycle rules.
//!
//! A job moves `pending -> running -> {done | error}` and nothing else. The
//! executor expresses each mutation as a [`Transition`]; stores call
//! [`next_status`] before writing so an illegal mutation never reaches
//! durable state.

use crate::error::CoreError;
use crate::problem::ProblemKind;
use crate::status::JobStatus;

/// A status-changing mutation of a job record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// `pending -> running`, applied when an executor picks the job up.
    Start,
    /// `running -> done`, storing the computation result.
    Complete {
        result: serde_json::Value,
        problem_kind: Option<ProblemKind>,
    },
    /// `running -> error`, storing the failure description.
    Fail { detail: String },
}

impl Transition {
    /// Verb used in error messages.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
        }
    }

    /// Status the job holds after this transition.
    pub fn target(&self) -> JobStatus {
        match self {
            Self::Start => JobStatus::Running,
            Self::Complete { .. } => JobStatus::Done,
            Self::Fail { .. } => JobStatus::Error,
        }
    }
}

/// Validate `transition` against the current status and return the new one.
///
/// Also rejects an empty result or error detail, since a `done` job must
/// carry a result and an `error` job must carry a description.
pub fn next_status(from: JobStatus, transition: &Transition) -> Result<JobStatus, CoreError> {
    let legal = matches!(
        (from, transition),
        (JobStatus::Pending, Transition::Start)
            | (JobStatus::Running, Transition::Complete { .. })
            | (JobStatus::Running, Transition::Fail { .. })
    );
    if !legal {
        return Err(CoreError::InvalidTransition {
            from,
            action: transition.action(),
        });
    }

    match transition {
        Transition::Complete { result, .. } if is_empty_result(result) => Err(CoreError::Validation(
            "A completed job must carry a result payload".to_string(),
        )),
        Transition::Fail { detail } if detail.trim().is_empty() => Err(CoreError::Validation(
            "A failed job must carry an error detail".to_string(),
        )),
        _ => Ok(transition.target()),
    }
}

/// `null`, `{}`, `[]` and blank strings carry no result.
fn is_empty_result(result: &serde_json::Value) -> bool {
    match result {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}
