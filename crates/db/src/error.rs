use automl_core::error::CoreError;

/// Errors from a [`JobStore`](crate::store::JobStore).
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A lifecycle or lookup error (not found, duplicate id, illegal transition).
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors from a [`WorkQueue`](crate::queue::WorkQueue).
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Work queue unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}
