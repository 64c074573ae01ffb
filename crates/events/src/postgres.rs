//! Cross-process progress bus over PostgreSQL `LISTEN` / `NOTIFY`.
//!
//! `NOTIFY` is delivered only to sessions listening at the time it is
//! committed and is never stored, which gives exactly the bus semantics:
//! no backlog, no replay, fan-out to every listener. PostgreSQL rejects
//! payloads of 8000 bytes or more, so oversized frames are slimmed before
//! sending: a `DONE` frame travels without its payload (the relay reads the
//! result from the job record) and long messages are shortened.

use async_trait::async_trait;
use automl_core::types::JobId;
use automl_db::DbPool;
use futures::StreamExt;
use sqlx::postgres::PgListener;

use crate::bus::{channel_name, BusError, ProgressBus, Subscription};
use crate::event::ProgressEvent;

/// Largest `NOTIFY` payload PostgreSQL accepts with the default page size.
pub const MAX_NOTIFY_BYTES: usize = 7999;

/// Progress bus shared by every process connected to the same database.
///
/// Publishing borrows a pooled connection for one `pg_notify` call. Each
/// subscription holds a dedicated listener connection that is closed when
/// the subscription is dropped.
#[derive(Clone)]
pub struct PgProgressBus {
    pool: DbPool,
}

impl PgProgressBus {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressBus for PgProgressBus {
    async fn publish(&self, job_id: JobId, event: &ProgressEvent) -> Result<(), BusError> {
        let frame = event.to_frame_within(MAX_NOTIFY_BYTES)?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel_name(job_id))
            .bind(frame)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, job_id: JobId) -> Result<Subscription, BusError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        // LISTEN has taken effect once this returns.
        listener.listen(&channel_name(job_id)).await?;

        let stream = futures::stream::unfold(Some(listener), move |state| async move {
            let mut listener = state?;
            loop {
                // `try_recv` reports a dropped connection as `Ok(None)`;
                // notifications sent meanwhile are lost, so surface it.
                match listener.try_recv().await {
                    Ok(Some(notification)) => match ProgressEvent::from_frame(notification.payload()) {
                        Ok(event) => return Some((Ok(event), Some(listener))),
                        Err(e) => {
                            tracing::warn!(%job_id, error = %e, "Ignoring malformed progress frame");
                        }
                    },
                    Ok(None) => {
                        let err = BusError::Transport("lost connection to the progress bus".into());
                        return Some((Err(err), None));
                    }
                    Err(e) => return Some((Err(e.into()), None)),
                }
            }
        })
        .boxed();

        Ok(Subscription::new(stream))
    }
}
