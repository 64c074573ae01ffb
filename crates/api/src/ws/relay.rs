//! Forwards one job's progress events to one client.

use std::future::Future;

use axum::extract::ws::Message;
use automl_core::types::JobId;
use automl_db::JobStore;
use automl_events::{EventKind, ProgressEvent, Subscription};
use futures::{Sink, SinkExt};

/// Why a relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// A `DONE` or `ERROR` event was forwarded.
    Terminal,
    /// The client went away first.
    ClientGone,
    /// The bus failed; a synthetic `ERROR` frame was sent instead.
    TransportFailed,
}

/// Forward `job_id`'s events from `subscription` to `sink` until a terminal
/// event is sent, the client disconnects, or the bus fails.
///
/// Each event becomes one text frame. A `DONE` marker that arrives without
/// its payload is completed from the job record in `store`. On a terminal
/// event or a bus failure the relay sends a close frame. `client_closed` is
/// watched while waiting for events and while sending, so a client that
/// stops reading is dropped. The subscription is dropped on return, which
/// unsubscribes it.
pub async fn relay<S, C>(
    mut subscription: Subscription,
    sink: &mut S,
    client_closed: C,
    store: &dyn JobStore,
    job_id: JobId,
) -> RelayOutcome
where
    S: Sink<Message> + Unpin,
    C: Future<Output = ()>,
{
    tokio::pin!(client_closed);

    loop {
        let next = tokio::select! {
            _ = &mut client_closed => return RelayOutcome::ClientGone,
            next = subscription.next_event() => next,
        };

        let mut event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                fail(sink, format!("Progress stream failed: {e}")).await;
                return RelayOutcome::TransportFailed;
            }
            None => {
                fail(sink, "Progress stream closed unexpectedly").await;
                return RelayOutcome::TransportFailed;
            }
        };

        if event.kind == EventKind::Done && event.payload.is_none() {
            // The executor records the result before publishing DONE.
            match store.get(job_id).await {
                Ok(job) => event.payload = job.result_payload,
                Err(e) => {
                    tracing::warn!(%job_id, error = %e, "Could not load result for DONE marker");
                }
            }
        }

        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                fail(sink, format!("Could not encode progress event: {e}")).await;
                return RelayOutcome::TransportFailed;
            }
        };

        let sent = tokio::select! {
            _ = &mut client_closed => return RelayOutcome::ClientGone,
            sent = sink.send(Message::Text(frame.into())) => sent,
        };
        if sent.is_err() {
            return RelayOutcome::ClientGone;
        }

        if event.is_terminal() {
            tokio::select! {
                _ = &mut client_closed => {}
                _ = sink.send(Message::Close(None)) => {}
            }
            return RelayOutcome::Terminal;
        }
    }
}

/// Send a synthetic `ERROR` frame and close the connection.
///
/// Affects only this client; the job's persisted status is untouched.
pub async fn fail<S>(sink: &mut S, message: impl Into<String>)
where
    S: Sink<Message> + Unpin,
{
    if let Ok(frame) = ProgressEvent::error(message).to_frame() {
        let _ = sink.send(Message::Text(frame.into())).await;
    }
    let _ = sink.send(Message::Close(None)).await;
}
