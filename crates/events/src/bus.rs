//! The progress bus contract.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use automl_core::types::JobId;
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::event::ProgressEvent;

/// Errors raised by a [`ProgressBus`] or a [`Subscription`].
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The underlying transport (database connection, broadcast channel)
    /// failed or went away.
    #[error("Progress bus transport failure: {0}")]
    Transport(String),

    #[error("Malformed progress frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<sqlx::Error> for BusError {
    fn from(err: sqlx::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Name of the channel carrying a job's events.
pub fn channel_name(job_id: JobId) -> String {
    format!("job_{}", job_id.simple())
}

/// Per-job publish/subscribe channel.
///
/// Channels exist implicitly. Publishing to a channel without subscribers
/// succeeds and the event is dropped. A subscription sees only events
/// published after [`subscribe`](ProgressBus::subscribe) returns, and every
/// subscriber gets its own copy of each event.
#[async_trait]
pub trait ProgressBus: Send + Sync {
    async fn publish(&self, job_id: JobId, event: &ProgressEvent) -> Result<(), BusError>;

    async fn subscribe(&self, job_id: JobId) -> Result<Subscription, BusError>;
}

/// A live cursor over one job's channel.
///
/// Yields `Err` once if the transport fails and ends after that. Dropping
/// the subscription unsubscribes and releases its resources.
pub struct Subscription {
    // Declared before `_guard` so the receiver is dropped first.
    stream: BoxStream<'static, Result<ProgressEvent, BusError>>,
    _guard: Option<Box<dyn Send>>,
}

impl Subscription {
    pub fn new(stream: BoxStream<'static, Result<ProgressEvent, BusError>>) -> Self {
        Self {
            stream,
            _guard: None,
        }
    }

    /// Attach a value dropped after the stream, used for channel cleanup.
    pub fn with_guard(mut self, guard: impl Send + 'static) -> Self {
        self._guard = Some(Box::new(guard));
        self
    }

    /// Wait for the next event. `None` means the channel was closed.
    pub async fn next_event(&mut self) -> Option<Result<ProgressEvent, BusError>> {
        self.stream.next().await
    }
}

impl Stream for Subscription {
    type Item = Result<ProgressEvent, BusError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}
