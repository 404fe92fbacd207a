//! Per-execution workflow state.
//!
//! An [`ExecutionState`] is rebuilt from the snapshot carried by every inbound
//! step request, advanced once by the step's handler result, and then either
//! shipped to the next step or published as the final state. Steps exchange
//! data only through the named `inputPath`/`resultPath` keys in `results`.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use providers::Provider;

use crate::catalog::WorkflowCatalog;
use crate::choice::evaluate_choices;
use crate::models::{OptimizationMode, Step, StepType, WorkflowDefinition};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One executed hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub step: String,
    pub function_execution_id: String,
    pub provider: Provider,
    #[serde(default)]
    pub step_metadata: Value,
}

/// Values passed into and produced by steps, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResults {
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub outputs: Map<String, Value>,
}

/// Set when the execution reached a `Fail` step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailInfo {
    pub message: Option<String>,
    pub fail_state: bool,
}

/// The serialized execution state passed between hops.
///
/// Every field is optional on the way in: a body carrying only `workflowName`
/// (and optionally the first step's input under `results.inputs`) starts a new
/// execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateSnapshot {
    pub workflow_name: String,
    pub execution_uuid: String,
    pub current_step: String,
    pub execution_history: Vec<HistoryEntry>,
    pub results: StepResults,
    pub fail: FailInfo,
    pub optimization_mode: OptimizationMode,
    #[serde(deserialize_with = "flag")]
    pub send_reports: bool,
    pub cold_execution: bool,
    pub function_instance_uuid: String,
}

/// `sendReports` is written as `0`/`1` by older clients.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean for `sendReports`, found {other}"
        ))),
    }
}

/// Context of the hop that is building the state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HopContext {
    pub function_execution_id: String,
    pub step_metadata: Value,
    pub cold_execution: bool,
    pub function_instance_uuid: String,
}

// ---------------------------------------------------------------------------
// ExecutionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub workflow_name: String,
    pub execution_uuid: String,
    pub current_step: String,
    /// Resolved by [`ExecutionState::set_results`]; `None` when terminal.
    pub next_step: Option<String>,
    pub execution_history: Vec<HistoryEntry>,
    pub results: StepResults,
    pub fail: FailInfo,
    pub optimization_mode: OptimizationMode,
    pub send_reports: bool,
    pub cold_execution: bool,
    pub function_instance_uuid: String,
    workflow: Arc<WorkflowDefinition>,
}

impl ExecutionState {
    /// Resume the execution described by `snapshot`, or start a new one.
    ///
    /// A snapshot with both `currentStep` and `executionUuid` continues that
    /// execution, keeping its history and fail info; anything else starts fresh
    /// at the workflow's `startAt` with a new execution UUID. Either way one
    /// history entry is appended for this hop.
    ///
    /// # Errors
    /// - [`EngineError::UnknownWorkflow`] when the snapshot names no loaded workflow.
    /// - [`EngineError::StepResolution`] when a resumed `currentStep` is not a step of it.
    pub fn initialize(
        snapshot: Option<StateSnapshot>,
        catalog: &WorkflowCatalog,
        hop: &HopContext,
    ) -> Result<Self, EngineError> {
        let snapshot = snapshot.unwrap_or_default();
        let workflow = catalog.find(&snapshot.workflow_name)?;

        let resume = !snapshot.current_step.is_empty() && !snapshot.execution_uuid.is_empty();
        let (current_step, execution_uuid, mut history, fail) = if resume {
            (
                snapshot.current_step,
                snapshot.execution_uuid,
                snapshot.execution_history,
                snapshot.fail,
            )
        } else {
            (
                workflow.start_at.clone(),
                Uuid::new_v4().to_string(),
                Vec::new(),
                FailInfo::default(),
            )
        };

        let step = workflow.step(&current_step).ok_or_else(|| {
            EngineError::step_resolution(
                &current_step,
                format!("not a step of workflow '{}'", workflow.name),
            )
        })?;

        history.push(HistoryEntry {
            step: current_step.clone(),
            function_execution_id: hop.function_execution_id.clone(),
            provider: step.provider.clone(),
            step_metadata: hop.step_metadata.clone(),
        });

        debug!(
            %execution_uuid,
            %current_step,
            resumed = resume,
            "execution state initialized"
        );

        Ok(Self {
            workflow_name: workflow.name.clone(),
            execution_uuid,
            current_step,
            next_step: None,
            execution_history: history,
            results: snapshot.results,
            fail,
            optimization_mode: snapshot.optimization_mode,
            send_reports: snapshot.send_reports,
            cold_execution: hop.cold_execution,
            function_instance_uuid: hop.function_instance_uuid.clone(),
            workflow,
        })
    }

    pub fn workflow(&self) -> &Arc<WorkflowDefinition> {
        &self.workflow
    }

    /// Definition of the step this hop runs.
    pub fn current_step_def(&self) -> &Step {
        // `initialize` rejects states whose current step is not in the workflow.
        &self.workflow.workflow[self.current_step.as_str()]
    }

    pub fn is_start_step(&self) -> bool {
        self.workflow.is_start(&self.current_step)
    }

    /// Input for this step's handler, `Null` when none was recorded.
    pub fn this_step_input(&self) -> Value {
        self.results
            .inputs
            .get(&self.current_step_def().input_path)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Output this step recorded, if any.
    pub fn this_step_output(&self) -> Option<&Value> {
        self.results.outputs.get(&self.current_step_def().result_path)
    }

    /// Record the handler's output and resolve the next step.
    ///
    /// The output is always written under this step's `resultPath`; it is
    /// written under the next step's `inputPath` only when a next step was
    /// resolved.
    ///
    /// # Errors
    /// [`EngineError::StepResolution`] when no choice matches or the step type
    /// is unrecognized. The output is still recorded in that case.
    pub fn set_results(&mut self, output: Value) -> Result<(), EngineError> {
        let workflow = Arc::clone(&self.workflow);
        let step = self.current_step_def().clone();

        let resolved = self.resolve_next(&step, &output);
        self.next_step = resolved.as_ref().ok().cloned().flatten();
        debug!(
            execution_uuid = %self.execution_uuid,
            next_step = ?self.next_step,
            "next step resolved"
        );

        self.results
            .outputs
            .insert(step.result_path.clone(), output.clone());

        if let Some(next) = &self.next_step {
            let next_def = workflow.step(next).ok_or_else(|| {
                EngineError::step_resolution(next, "next step is not part of the workflow")
            })?;
            self.results.inputs.insert(next_def.input_path.clone(), output);
        }

        resolved.map(|_| ())
    }

    fn resolve_next(&mut self, step: &Step, output: &Value) -> Result<Option<String>, EngineError> {
        if step.end {
            return Ok(None);
        }

        match step.step_type {
            StepType::Task => Ok(step.next.clone()),
            StepType::ChoiceTask => {
                evaluate_choices(&self.current_step, &step.choices, output)
                    .map(|next| Some(next.to_owned()))
            }
            StepType::Fail => {
                self.fail = FailInfo {
                    message: Some(format!("Current step {} is type Fail", self.current_step)),
                    fail_state: true,
                };
                Ok(None)
            }
            StepType::Unrecognized => Err(EngineError::step_resolution(
                &self.current_step,
                "unrecognized step type",
            )),
        }
    }

    /// The state as it leaves this hop: no workflow graph, no `nextStep`.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            workflow_name: self.workflow_name.clone(),
            execution_uuid: self.execution_uuid.clone(),
            current_step: self.current_step.clone(),
            execution_history: self.execution_history.clone(),
            results: self.results.clone(),
            fail: self.fail.clone(),
            optimization_mode: self.optimization_mode,
            send_reports: self.send_reports,
            cold_execution: self.cold_execution,
            function_instance_uuid: self.function_instance_uuid.clone(),
        }
    }

    /// The snapshot handed to the next step, with `currentStep` advanced.
    ///
    /// `None` when no next step was resolved.
    pub fn outbound_snapshot(&self) -> Option<StateSnapshot> {
        let next = self.next_step.as_ref()?;
        let mut snapshot = self.snapshot();
        snapshot.current_step = next.clone();
        Some(snapshot)
    }
}
