//! Job executor: pulls work items off the queue, runs the computation and
//! records the outcome.
//!
//! Used by the `automl-worker` binary and by the API server when it runs
//! embedded executor loops.

pub mod config;
pub mod error;
pub mod executor;

pub use config::{ConfigError, WorkerConfig};
pub use error::ExecutorError;
pub use executor::Executor;
