use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use automl_core::types::JobId;
use automl_db::JobStore;
use automl_events::{BusError, ProgressBus, Subscription};
use futures::StreamExt;

use crate::error::AppResult;
use crate::state::AppState;
use crate::ws::relay::{self, RelayOutcome};

/// GET /api/v1/jobs/{id}/stream
///
/// Unknown jobs are rejected with 404 before the upgrade. The subscription
/// is opened before the upgrade response is sent, so every event published
/// after the client sees the connection open is delivered.
pub async fn stream_job(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Response> {
    state.store.get(job_id).await?;

    let subscription = state.bus.subscribe(job_id).await;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, job_id, subscription)))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    job_id: JobId,
    subscription: Result<Subscription, BusError>,
) {
    let (mut sink, mut stream) = socket.split();

    let subscription = match subscription {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(%job_id, error = %e, "Progress subscription failed");
            relay::fail(&mut sink, format!("Progress stream failed: {e}")).await;
            return;
        }
    };
    tracing::info!(%job_id, "Progress stream opened");

    let client_closed = async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };

    let outcome = relay::relay(subscription, &mut sink, client_closed, state.store.as_ref(), job_id).await;
    match outcome {
        RelayOutcome::TransportFailed => {
            tracing::warn!(%job_id, "Progress stream ended by transport failure");
        }
        _ => tracing::info!(%job_id, ?outcome, "Progress stream closed"),
    }
}
