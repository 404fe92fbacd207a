//! Answering hints.

use crate::coldstart::InstanceClassification;
use crate::hint::{HintAck, HintMessage, TriggeredFrom};

/// Acknowledge a hint for the instance as classified.
///
/// Repeated hints to the same instance are answered with `wasCold = 0`.
pub fn acknowledge(
    classification: &InstanceClassification,
    function_execution_id: &str,
    message: Option<&HintMessage>,
) -> HintAck {
    HintAck {
        function_instance_uuid: classification.instance_uuid.clone(),
        was_cold: u8::from(classification.cold_execution),
        function_execution_id: function_execution_id.to_owned(),
        hint_message: message.cloned(),
        fan_out: None,
    }
}

/// Whether the receiver has to propagate `message` further.
///
/// Only cold instances reached by a proxy hint in a propagating mode do; the
/// depth check is left to the planner.
pub fn owes_fan_out(classification: &InstanceClassification, message: &HintMessage) -> bool {
    classification.cold_execution && message.hint_proxy && message.optimization_mode.propagates()
}

/// Origin stamp for hints this receiver sends on.
pub fn receiver_origin(
    classification: &InstanceClassification,
    function_execution_id: &str,
    message: &HintMessage,
) -> TriggeredFrom {
    TriggeredFrom {
        function_execution_id: function_execution_id.to_owned(),
        function_instance_uuid: classification.instance_uuid.clone(),
        step: message.step_name.clone(),
        execution_uuid: message.triggered_from.execution_uuid.clone(),
    }
}
