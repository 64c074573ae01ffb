use automl_db::{DbError, QueueError};

/// Failures that stop the executor from handling a work item.
///
/// Computation failures are not listed here: they are recorded on the job
/// and never surface from [`Executor::execute`](crate::Executor::execute).
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Job store error: {0}")]
    Store(#[from] DbError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
