use std::sync::Arc;

use anyhow::Context;
use automl_db::{PgJobStore, PgWorkQueue};
use automl_events::PgProgressBus;
use automl_pipeline::BaselineTrainer;
use automl_worker::{Executor, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automl_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Loaded worker configuration",
    );

    let pool = automl_db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    automl_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    let executor = Executor::new(
        Arc::new(PgJobStore::new(pool.clone())),
        Arc::new(PgWorkQueue::new(pool.clone())),
        Arc::new(PgProgressBus::new(pool)),
        Arc::new(BaselineTrainer::new(config.upload_dir.clone())),
    )
    .with_poll_interval(config.poll_interval);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
        signal_cancel.cancel();
    });

    executor.run(cancel).await;
    tracing::info!("Worker stopped");
    Ok(())
}
