//! The computation collaborator and the input catalog.
//!
//! The executor treats a [`Computation`] as an opaque, blocking function
//! that reports progress through a [`ProgressSink`]. The shipped
//! implementation, [`BaselineTrainer`], reads a CSV from the upload
//! directory, detects the [`ProblemKind`](automl_core::problem::ProblemKind)
//! of the target column and evaluates the matching baseline strategy.
//!
//! The dispatcher uses an [`InputCatalog`] for its synchronous feasibility
//! check before a job is created.

pub mod computation;
pub mod dataset;
pub mod detect;
pub mod input;
pub mod metrics;
pub mod strategy;
pub mod trainer;

pub use computation::{Computation, ComputationError, ComputationOutput, ProgressSink};
pub use input::{FeasibilityError, InputCatalog, UploadDirCatalog};
pub use trainer::BaselineTrainer;
