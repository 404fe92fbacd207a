//! `queue` crate: the durable completion sink.
//!
//! When a workflow reaches its terminal step the final state snapshot is handed
//! to a [`CompletionSink`]. Publishing is the only signal that an execution
//! finished, so sink failures are always surfaced to the caller.

pub mod error;
pub mod sink;
pub mod http;
pub mod memory;

pub use error::QueueError;
pub use http::HttpQueueSink;
pub use memory::MemoryQueue;
pub use sink::{CompletionSink, CorrelationAttributes, FinishQueue, SinkAck};
