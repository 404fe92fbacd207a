//! Handler-level error type.

use thiserror::Error;

/// Errors returned by a step handler.
///
/// The runtime never retries a handler; either variant aborts the current hop
/// before any next step is resolved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler rejected the value it was given.
    #[error("invalid handler input: {0}")]
    InvalidInput(String),

    /// The handler ran and failed.
    #[error("handler failed: {0}")]
    Failed(String),
}
