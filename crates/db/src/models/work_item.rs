use automl_core::types::JobId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A unit of work handed from the dispatcher to an executor.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WorkItem {
    pub job_id: JobId,
    pub input_reference: String,
    pub target_spec: String,
}
