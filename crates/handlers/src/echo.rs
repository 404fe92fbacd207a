//! `EchoHandler`: returns its input unchanged.
//!
//! Served by the CLI when no user handler is linked in, so a workflow can be
//! exercised end to end against real provider endpoints.

use serde_json::Value;
use tracing::debug;

use crate::{HandlerOutput, StepHandler};

#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl StepHandler for EchoHandler {
    fn call(&self, input: Value) -> HandlerOutput {
        debug!(?input, "echo handler invoked");
        HandlerOutput::value(input)
    }
}
