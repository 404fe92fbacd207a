//! Hint wire format.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use providers::Provider;

use crate::hint::HintOutcome;
use crate::models::OptimizationMode;

/// Where a hint originated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggeredFrom {
    pub function_execution_id: String,
    pub function_instance_uuid: String,
    pub step: String,
    /// Execution UUID of the workflow run that caused the hint.
    #[serde(rename = "wfState")]
    pub execution_uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintMessage {
    pub triggered_from: TriggeredFrom,
    #[serde(default)]
    pub optimization_mode: OptimizationMode,
    /// The step the hint is addressed to.
    pub step_name: String,
    #[serde(default)]
    pub hint_proxy: bool,
    #[serde(default)]
    pub recursive_hint_counter: u32,
    #[serde(default)]
    pub workflow_name: String,
    /// Provider the receiver should forward one proxy hint to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
}

impl HintMessage {
    /// Request body carrying this message.
    pub fn to_payload(&self) -> Value {
        json!({ "hintMessage": self })
    }
}

/// Request body of a flag-only hint.
pub fn flag_payload() -> Value {
    json!({ "hintFlag": true })
}

/// Answer of a hint receiver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HintAck {
    pub function_instance_uuid: String,
    /// `1` when the hint found the instance cold.
    pub was_cold: u8,
    pub function_execution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint_message: Option<HintMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_out: Option<HintOutcome>,
}
