//! Choice evaluation for `ChoiceTask` steps.
//!
//! Choices are tried in declaration order and the first match wins. Running out
//! of choices is an error, never a silent end of the workflow.

use serde_json::Value;

use crate::models::{Choice, ChoiceType};
use crate::EngineError;

impl ChoiceType {
    /// Compare the handler's value for a choice variable against its condition.
    pub fn compare(self, actual: Option<&Value>, condition: &Value) -> bool {
        match self {
            ChoiceType::StringEquals => matches!(
                (actual, condition),
                (Some(Value::String(a)), Value::String(c)) if a == c
            ),
            ChoiceType::Unsupported => false,
        }
    }
}

impl Choice {
    pub fn matches(&self, output: &Value) -> bool {
        self.choice_type
            .compare(output.get(&self.variable), &self.condition)
    }
}

/// Pick the successor of `step` for the given handler output.
///
/// # Errors
/// [`EngineError::StepResolution`] when no choice matches.
pub fn evaluate_choices<'a>(
    step: &str,
    choices: &'a [Choice],
    output: &Value,
) -> Result<&'a str, EngineError> {
    choices
        .iter()
        .find(|choice| choice.matches(output))
        .map(|choice| choice.next.as_str())
        .ok_or_else(|| {
            EngineError::step_resolution(step, "no choice condition matched the handler output")
        })
}
