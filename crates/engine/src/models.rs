//! Core domain models for the relay engine.
//!
//! These types mirror the workflow file (`{"workflows": [...]}`) one to one.
//! They are loaded once per process and never mutated afterwards.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use providers::{FunctionEndpoint, Provider};
use queue::FinishQueue;

// ---------------------------------------------------------------------------
// StepType
// ---------------------------------------------------------------------------

/// How a step picks its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    /// Static `next`.
    Task,
    /// First matching entry of `choices`.
    ChoiceTask,
    /// Terminal failure.
    Fail,
    /// Any type name the engine does not know; rejected when the step finishes.
    #[serde(other)]
    Unrecognized,
}

// ---------------------------------------------------------------------------
// Choice
// ---------------------------------------------------------------------------

/// Comparison used by a [`Choice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChoiceType {
    #[serde(rename = "stringEquals")]
    StringEquals,
    /// Comparison kinds without an evaluator never match.
    #[serde(other)]
    Unsupported,
}

/// One branch of a `ChoiceTask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    /// Key looked up in the handler output object.
    pub variable: String,
    pub condition: Value,
    pub choice_type: ChoiceType,
    pub next: String,
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single named unit of a workflow, bound to a provider and endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub provider: Provider,
    pub function_endpoint: FunctionEndpoint,
    /// Key in `results.inputs` this step reads its input from.
    #[serde(default)]
    pub input_path: String,
    /// Key in `results.outputs` this step's output is written to.
    #[serde(default)]
    pub result_path: String,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub end: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_queue: Option<FinishQueue>,
}

/// Workflow files written by hand use both `true` and `"true"` for `end`.
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => Ok(s == "true"),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean for `end`, found {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete workflow graph keyed by step name, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub name: String,
    pub start_at: String,
    pub workflow: IndexMap<String, Step>,
}

impl WorkflowDefinition {
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.workflow.get(name)
    }

    pub fn is_start(&self, name: &str) -> bool {
        self.start_at == name
    }

    /// Step names other than `exclude`, in declaration order.
    pub fn other_steps<'a>(&'a self, exclude: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.workflow
            .keys()
            .map(String::as_str)
            .filter(move |name| *name != exclude)
    }

    /// Steps hosted by `provider` other than `exclude`, in declaration order.
    pub fn siblings<'a>(
        &'a self,
        provider: &'a Provider,
        exclude: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.workflow
            .iter()
            .filter(move |(name, step)| &step.provider == provider && name.as_str() != exclude)
            .map(|(name, _)| name.as_str())
    }

    /// Distinct providers in order of first appearance.
    pub fn providers(&self) -> Vec<&Provider> {
        let mut seen: Vec<&Provider> = Vec::new();
        for step in self.workflow.values() {
            if !seen.contains(&&step.provider) {
                seen.push(&step.provider);
            }
        }
        seen
    }

    /// First provider after `provider` in order of appearance, other than `skip`.
    pub fn provider_after(&self, provider: &Provider, skip: &Provider) -> Option<&Provider> {
        self.providers()
            .into_iter()
            .skip_while(|p| *p != provider)
            .skip(1)
            .find(|p| *p != skip)
    }

    /// All steps hosted by `provider`, in declaration order.
    pub fn steps_on<'a>(&'a self, provider: &'a Provider) -> impl Iterator<Item = &'a str> + 'a {
        self.siblings(provider, "")
    }
}

/// Top-level shape of a workflow file.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowFile {
    pub workflows: Vec<WorkflowDefinition>,
}

// ---------------------------------------------------------------------------
// OptimizationMode
// ---------------------------------------------------------------------------

/// Cold-start hinting strategy carried through an execution.
///
/// Encoded as an integer on the wire (`0`–`5`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OptimizationMode {
    #[default]
    Disabled,
    Naive,
    NaiveAlways,
    Heuristic,
    HeuristicProviderSeparation,
    ReportOnly,
}

impl OptimizationMode {
    /// Modes whose receivers fan hints out further.
    pub fn propagates(self) -> bool {
        matches!(self, Self::Heuristic | Self::HeuristicProviderSeparation)
    }
}

impl TryFrom<u8> for OptimizationMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::Naive),
            2 => Ok(Self::NaiveAlways),
            3 => Ok(Self::Heuristic),
            4 => Ok(Self::HeuristicProviderSeparation),
            5 => Ok(Self::ReportOnly),
            other => Err(format!("unknown optimization mode {other}")),
        }
    }
}

impl From<OptimizationMode> for u8 {
    fn from(mode: OptimizationMode) -> Self {
        match mode {
            OptimizationMode::Disabled => 0,
            OptimizationMode::Naive => 1,
            OptimizationMode::NaiveAlways => 2,
            OptimizationMode::Heuristic => 3,
            OptimizationMode::HeuristicProviderSeparation => 4,
            OptimizationMode::ReportOnly => 5,
        }
    }
}

impl std::fmt::Display for OptimizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}
