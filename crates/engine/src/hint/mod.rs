//! Cold-start hinting.
//!
//! A cold function instance warns the instances of later steps so they can
//! start before the workflow reaches them. How far the warning travels is set
//! by the execution's [`OptimizationMode`](crate::models::OptimizationMode).

pub mod coordinator;
pub mod message;
pub mod planner;
pub mod receiver;

pub use coordinator::{HintConfig, HintCoordinator, HintOrigin, HintOutcome, DEFAULT_HINT_CEILING};
pub use message::{flag_payload, HintAck, HintMessage, TriggeredFrom};
pub use planner::{plan_fan_out, plan_hints, HintPlan, HintTarget};
