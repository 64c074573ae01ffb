//! Progress bus for job events.
//!
//! - [`ProgressEvent`] — the `LOG` / `DONE` / `ERROR` frame sent to viewers.
//! - [`ProgressBus`] — per-job, fire-and-forget publish/subscribe. Nothing is
//!   buffered for absent subscribers and nothing is replayed.
//! - [`LocalProgressBus`] — in-process implementation over
//!   `tokio::sync::broadcast`.
//! - [`PgProgressBus`] — cross-process implementation over PostgreSQL
//!   `LISTEN` / `NOTIFY`.
//! - [`JobPublisher`] — per-job publishing handle that makes the terminal
//!   event the last one by consuming itself.

pub mod bus;
pub mod event;
pub mod local;
pub mod postgres;
pub mod publisher;

pub use bus::{channel_name, BusError, ProgressBus, Subscription};
pub use event::{EventKind, ProgressEvent};
pub use local::LocalProgressBus;
pub use postgres::{PgProgressBus, MAX_NOTIFY_BYTES};
pub use publisher::JobPublisher;
