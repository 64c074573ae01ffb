use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use automl_api::config::ServerConfig;
use automl_api::engine::dispatcher::Dispatcher;
use automl_api::engine::spawn_embedded_workers;
use automl_api::router::build_app_router;
use automl_api::state::AppState;
use automl_db::{JobStore, PgJobStore, PgWorkQueue, WorkQueue};
use automl_events::{PgProgressBus, ProgressBus};
use automl_pipeline::{BaselineTrainer, UploadDirCatalog};
use automl_worker::Executor;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automl_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = automl_db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    automl_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    automl_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Store, queue, bus ---
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
    let queue: Arc<dyn WorkQueue> = Arc::new(PgWorkQueue::new(pool.clone()));
    let bus: Arc<dyn ProgressBus> = Arc::new(PgProgressBus::new(pool));

    let catalog = Arc::new(UploadDirCatalog::new(config.upload_dir.clone()));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        catalog,
    ));

    // --- Embedded executors ---
    let workers_cancel = CancellationToken::new();
    let worker_handles = if config.embedded_workers > 0 {
        let executor = Arc::new(Executor::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            Arc::clone(&bus),
            Arc::new(BaselineTrainer::new(config.upload_dir.clone())),
        ));
        spawn_embedded_workers(executor, config.embedded_workers, &workers_cancel)
    } else {
        Vec::new()
    };
    tracing::info!(count = worker_handles.len(), "Embedded executors started");

    // --- App state ---
    let state = AppState {
        store,
        bus,
        dispatcher,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = config
        .host
        .parse::<IpAddr>()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Running jobs finish before their executor loop exits.
    workers_cancel.cancel();
    for handle in worker_handles {
        let _ = tokio::time::timeout(Duration::from_secs(30), handle).await;
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
