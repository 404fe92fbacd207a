//! `engine` crate: workflow models, the execution state machine, step
//! dispatch, cold-start hinting, and the per-instance function runtime.

pub mod models;
pub mod error;
pub mod validate;
pub mod catalog;
pub mod choice;
pub mod state;
pub mod coldstart;
pub mod clock;
pub mod join;
pub mod dispatcher;
pub mod hint;
pub mod report;
pub mod config;
pub mod runtime;

pub use catalog::WorkflowCatalog;
pub use config::RuntimeConfig;
pub use error::EngineError;
pub use models::{OptimizationMode, Step, StepType, WorkflowDefinition};
pub use runtime::{FunctionRuntime, HopMetadata, InboundRequest, InvocationResponse};
pub use state::{ExecutionState, StateSnapshot};
pub use validate::validate_workflow;
