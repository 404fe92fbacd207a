//! The `StepHandler` trait: the contract every user handler must fulfil.

use futures::future::BoxFuture;
use serde_json::Value;

use crate::HandlerError;

/// What a handler hands back to the runtime.
///
/// Handlers that compute their result synchronously return [`HandlerOutput::Ready`];
/// handlers that need to await I/O return [`HandlerOutput::Deferred`]. The runtime
/// resolves both the same way before recording results.
pub enum HandlerOutput {
    Ready(Result<Value, HandlerError>),
    Deferred(BoxFuture<'static, Result<Value, HandlerError>>),
}

impl HandlerOutput {
    /// Successful immediate value.
    pub fn value(value: Value) -> Self {
        Self::Ready(Ok(value))
    }

    /// Immediate failure.
    pub fn error(error: HandlerError) -> Self {
        Self::Ready(Err(error))
    }

    /// Wrap a future whose output becomes the step result.
    pub fn deferred<F>(future: F) -> Self
    where
        F: std::future::Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        Self::Deferred(Box::pin(future))
    }

    /// Whether the value is available without awaiting.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Wait for the handler's value.
    pub async fn resolve(self) -> Result<Value, HandlerError> {
        match self {
            Self::Ready(result) => result,
            Self::Deferred(future) => future.await,
        }
    }
}

impl std::fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// The core handler trait.
///
/// `input` is the value stored under the current step's `inputPath`, or `Null`
/// when nothing has been written there yet (for example on the first step of a
/// fresh execution).
pub trait StepHandler: Send + Sync {
    fn call(&self, input: Value) -> HandlerOutput;
}

impl<F> StepHandler for F
where
    F: Fn(Value) -> HandlerOutput + Send + Sync,
{
    fn call(&self, input: Value) -> HandlerOutput {
        self(input)
    }
}
