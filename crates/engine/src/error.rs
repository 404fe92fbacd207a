//! Engine-level error types.

use thiserror::Error;

use handlers::HandlerError;
use providers::TransportError;
use queue::QueueError;

use crate::report::ReportError;

/// Errors produced by the relay engine (definitions + invocation).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Definition errors ------

    /// The workflow file could not be read or parsed.
    #[error("cannot load workflow definitions: {0}")]
    DefinitionLoad(String),

    /// A workflow definition is structurally broken.
    #[error("workflow '{workflow}' is invalid: {reason}")]
    InvalidDefinition { workflow: String, reason: String },

    // ------ Invocation errors ------

    /// The inbound body is neither a hint nor a workflow state.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// No loaded workflow carries the requested name. Rejects the invocation.
    #[error("no workflow definition named '{0}'")]
    UnknownWorkflow(String),

    /// The next step could not be determined, or the current step is not part
    /// of the workflow.
    #[error("cannot resolve step '{step}': {reason}")]
    StepResolution { step: String, reason: String },

    /// The dispatch target's provider has no registered invoker.
    #[error("unknown provider '{provider}' for step '{step}'")]
    UnknownProvider { step: String, provider: String },

    /// A blocking network call failed.
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// The final state could not be handed to the completion queue.
    #[error("queue publish error: {0}")]
    QueuePublish(#[from] QueueError),

    /// The user handler failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The monitor did not take a report. Never fails an invocation.
    #[error("report not delivered: {0}")]
    Report(#[from] ReportError),

    /// A spawned side task was cancelled or panicked.
    #[error("background task '{0}' did not complete")]
    TaskAborted(String),
}

impl EngineError {
    pub(crate) fn step_resolution(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StepResolution {
            step: step.into(),
            reason: reason.into(),
        }
    }
}
