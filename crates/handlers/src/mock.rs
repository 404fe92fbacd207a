//! `MockHandler`: a test double for `StepHandler`.
//!
//! Useful in unit and integration tests where the handler's behaviour must be
//! scripted and its inputs inspected afterwards.

use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::{HandlerError, HandlerOutput, StepHandler};

/// Behaviour injected into `MockHandler` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value immediately.
    ReturnValue(Value),
    /// Return a specific JSON value from a deferred future.
    ReturnDeferred(Value),
    /// Fail with a `Failed` error.
    Fail(String),
}

/// A mock handler that records every input it receives and returns a
/// programmer-specified result.
pub struct MockHandler {
    pub behaviour: MockBehaviour,
    /// All inputs seen by this handler (in call order).
    pub calls: Arc<Mutex<Vec<Value>>>,
}

impl MockHandler {
    /// Create a mock that always succeeds synchronously with the given value.
    pub fn returning(value: Value) -> Self {
        Self::with(MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that always succeeds through a deferred future.
    pub fn returning_deferred(value: Value) -> Self {
        Self::with(MockBehaviour::ReturnDeferred(value))
    }

    /// Create a mock that always fails.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Fail(msg.into()))
    }

    fn with(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times this handler has been called.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Input of the most recent call.
    pub fn last_input(&self) -> Option<Value> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl StepHandler for MockHandler {
    fn call(&self, input: Value) -> HandlerOutput {
        self.calls.lock().unwrap().push(input);

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => HandlerOutput::value(v.clone()),
            MockBehaviour::ReturnDeferred(v) => {
                let v = v.clone();
                HandlerOutput::deferred(async move { Ok(v) })
            }
            MockBehaviour::Fail(msg) => HandlerOutput::error(HandlerError::Failed(msg.clone())),
        }
    }
}
