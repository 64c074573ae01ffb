//! Contract between the executor and the long-running computation.

use automl_core::problem::ProblemKind;
use tokio::sync::mpsc;

/// Failure raised by a computation. The message becomes the job's
/// `error_detail` verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ComputationError(pub String);

impl ComputationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result of a successful computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputationOutput {
    /// Set when the computation classified the target.
    pub problem_kind: Option<ProblemKind>,
    /// Stored as the job's `result_payload` and sent on the `DONE` event.
    pub payload: serde_json::Value,
}

/// Progress callback handed to a computation.
///
/// Lines are delivered to the executor in the order they are emitted.
/// Emitting never blocks and never fails; lines sent after the executor
/// stopped listening are dropped.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    sender: mpsc::UnboundedSender<String>,
}

impl ProgressSink {
    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn emit(&self, line: impl Into<String>) {
        let _ = self.sender.send(line.into());
    }
}

/// A long-running, blocking computation.
///
/// Called on a blocking thread; implementations may do synchronous I/O
/// and heavy CPU work.
pub trait Computation: Send + Sync + 'static {
    fn compute(
        &self,
        input_reference: &str,
        target_spec: &str,
        progress: &ProgressSink,
    ) -> Result<ComputationOutput, ComputationError>;
}
