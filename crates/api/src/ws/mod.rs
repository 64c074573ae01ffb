//! WebSocket streaming of job progress.
//!
//! [`stream_job`] upgrades the connection and hands it to the relay, which
//! forwards the job's bus events as text frames until a terminal event.

mod handler;
pub mod relay;

pub use handler::stream_job;
pub use relay::RelayOutcome;
