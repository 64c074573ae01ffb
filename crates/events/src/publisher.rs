//! Per-job publishing handle used by the executor.

use std::sync::Arc;

use automl_core::types::JobId;

use crate::bus::{BusError, ProgressBus};
use crate::event::ProgressEvent;

/// Message length kept when a terminal event has to be resent slimmed.
const FALLBACK_MESSAGE_BYTES: usize = 1024;

/// Publishes one job's events in order.
///
/// [`done`](Self::done) and [`error`](Self::error) consume the handle, so
/// after a terminal event nothing else can be published through it. If the
/// bus refuses a terminal event, it is resent once without its payload and
/// with a shortened message, so subscribers still see the stream end.
pub struct JobPublisher {
    bus: Arc<dyn ProgressBus>,
    job_id: JobId,
}

impl JobPublisher {
    pub fn new(bus: Arc<dyn ProgressBus>, job_id: JobId) -> Self {
        Self { bus, job_id }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub async fn log(&mut self, message: impl Into<String>) -> Result<(), BusError> {
        self.bus
            .publish(self.job_id, &ProgressEvent::log(message))
            .await
    }

    pub async fn done(
        self,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<(), BusError> {
        self.finish(ProgressEvent::done(message, payload)).await
    }

    pub async fn error(self, message: impl Into<String>) -> Result<(), BusError> {
        self.finish(ProgressEvent::error(message)).await
    }

    async fn finish(self, event: ProgressEvent) -> Result<(), BusError> {
        let Err(e) = self.bus.publish(self.job_id, &event).await else {
            return Ok(());
        };
        tracing::warn!(
            job_id = %self.job_id,
            kind = ?event.kind,
            error = %e,
            "Terminal event refused by the bus, resending slimmed",
        );
        self.bus
            .publish(self.job_id, &event.slimmed(FALLBACK_MESSAGE_BYTES))
            .await
    }
}
