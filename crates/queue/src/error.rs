//! Typed error type for the queue crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("publishing to {queue_url} failed: {message}")]
    Publish { queue_url: String, message: String },

    #[error("{queue_url} rejected the message with status {status}")]
    Rejected { queue_url: String, status: u16 },

    #[error("queue client setup failed: {0}")]
    Client(String),
}
