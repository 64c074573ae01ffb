use std::sync::Arc;

use automl_db::JobStore;
use automl_events::ProgressBus;

use crate::config::ServerConfig;
use crate::engine::dispatcher::Dispatcher;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Job record store, read by the status endpoint and the stream handler.
    pub store: Arc<dyn JobStore>,
    /// Progress bus the stream handler subscribes to.
    pub bus: Arc<dyn ProgressBus>,
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<ServerConfig>,
}
