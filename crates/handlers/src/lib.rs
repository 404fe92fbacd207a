//! `handlers` crate: the contract between the relay runtime and user code.
//!
//! Every workflow step runs exactly one [`StepHandler`]. The handler receives
//! the value threaded in from the previous step and returns a [`HandlerOutput`],
//! which is either ready immediately or deferred behind a future.

pub mod error;
pub mod traits;
pub mod echo;
pub mod mock;

pub use echo::EchoHandler;
pub use error::HandlerError;
pub use traits::{HandlerOutput, StepHandler};
