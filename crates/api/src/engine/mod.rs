//! Job submission and embedded execution.
//!
//! [`dispatcher::Dispatcher`] validates a submission, records the job and
//! queues it. [`spawn_embedded_workers`] runs executor loops inside the API
//! process for single-binary deployments.

pub mod dispatcher;

use std::sync::Arc;

use automl_worker::Executor;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn `count` executor loops sharing one [`Executor`].
pub fn spawn_embedded_workers(
    executor: Arc<Executor>,
    count: usize,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|index| {
            let executor = Arc::clone(&executor);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tracing::info!(index, "Embedded executor starting");
                executor.run(cancel).await;
            })
        })
        .collect()
}
