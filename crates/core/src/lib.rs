//! Shared domain types for the AutoML job relay.
//!
//! This crate has no internal dependencies. It holds the job lifecycle
//! rules (status values and legal transitions), the problem-kind tag, and
//! the domain error type used by every other crate.

pub mod error;
pub mod lifecycle;
pub mod problem;
pub mod status;
pub mod types;
