//! Hand-off from one step to the next.
//!
//! After a step's results are recorded, [`StepDispatcher::trigger_next`] either
//! invokes the next step on its provider, publishes the final state to the
//! completion queue, or reports why there is nothing left to do.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

use providers::{InvocationMode, ProviderRegistry};
use queue::{CompletionSink, CorrelationAttributes, SinkAck};

use crate::models::StepType;
use crate::state::ExecutionState;
use crate::EngineError;

/// What `trigger_next` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum DispatchOutcome {
    /// The final state was accepted by the completion queue.
    #[serde(rename_all = "camelCase")]
    Published {
        queue_url: String,
        message_id: Option<String>,
    },
    /// The workflow ended and no completion queue is configured.
    Completed { message: String },
    /// The workflow ended in a `Fail` step.
    Failed { message: String },
    /// The next step was handed to its provider.
    #[serde(rename_all = "camelCase")]
    Triggered {
        next_step: String,
        provider: String,
        status: u16,
    },
    /// Nothing to dispatch.
    NoOp { message: String },
}

impl From<SinkAck> for DispatchOutcome {
    fn from(ack: SinkAck) -> Self {
        Self::Published {
            queue_url: ack.queue_url,
            message_id: ack.message_id,
        }
    }
}

#[derive(Clone)]
pub struct StepDispatcher {
    providers: Arc<ProviderRegistry>,
    sink: Option<Arc<dyn CompletionSink>>,
}

impl StepDispatcher {
    pub fn new(providers: Arc<ProviderRegistry>, sink: Option<Arc<dyn CompletionSink>>) -> Self {
        Self { providers, sink }
    }

    /// Invoke the next step, publish the final state, or do nothing.
    ///
    /// # Errors
    /// - [`EngineError::UnknownProvider`] when the next step's provider has no invoker.
    /// - [`EngineError::Network`] when the provider did not accept the invocation.
    /// - [`EngineError::QueuePublish`] when the final state could not be published.
    #[instrument(
        skip_all,
        fields(execution_uuid = %state.execution_uuid, step = %state.current_step)
    )]
    pub async fn trigger_next(
        &self,
        state: &ExecutionState,
    ) -> Result<DispatchOutcome, EngineError> {
        let step = state.current_step_def();

        if step.end {
            return self.finish(state).await;
        }

        if step.step_type == StepType::Fail {
            let message = format!(
                "step {} was a Fail state in workflow {}, execution uuid {}",
                state.current_step, state.workflow_name, state.execution_uuid
            );
            info!("{message}");
            return Ok(DispatchOutcome::Failed { message });
        }

        let (Some(next), Some(snapshot)) = (state.next_step.as_ref(), state.outbound_snapshot())
        else {
            let message = "no next step to trigger".to_owned();
            info!("{message}");
            return Ok(DispatchOutcome::NoOp { message });
        };

        let next_def = state.workflow().step(next).ok_or_else(|| {
            EngineError::step_resolution(next, "next step is not part of the workflow")
        })?;

        let invoker = self
            .providers
            .get(&next_def.provider)
            .ok_or_else(|| EngineError::UnknownProvider {
                step: next.clone(),
                provider: next_def.provider.to_string(),
            })?;

        info!(next_step = %next, provider = %next_def.provider, "triggering next step");
        let payload = json!({ "workflowState": snapshot });
        let response = invoker
            .invoke(&next_def.function_endpoint, &payload, InvocationMode::FireAndForget)
            .await?;

        Ok(DispatchOutcome::Triggered {
            next_step: next.clone(),
            provider: next_def.provider.to_string(),
            status: response.status,
        })
    }

    async fn finish(&self, state: &ExecutionState) -> Result<DispatchOutcome, EngineError> {
        let step = state.current_step_def();

        let (Some(queue), Some(sink)) = (step.finish_queue.as_ref(), self.sink.as_ref()) else {
            let message = format!(
                "step {} was the final step in workflow {}, execution uuid {}",
                state.current_step, state.workflow_name, state.execution_uuid
            );
            info!("{message}");
            return Ok(DispatchOutcome::Completed { message });
        };

        let message = json!({ "workflowState": state.snapshot() });
        let attributes = CorrelationAttributes {
            execution_uuid: state.execution_uuid.clone(),
        };
        let ack = sink.send(queue, &message, &attributes).await?;
        info!(queue_url = %ack.queue_url, "final state published");

        Ok(ack.into())
    }
}

impl std::fmt::Debug for StepDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDispatcher")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
