//! Transport-level error type.

use thiserror::Error;

/// Errors raised while invoking a remote function.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, TLS, timeout, ...).
    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    /// The provider answered with a non-success status.
    #[error("{endpoint} responded with status {status}")]
    Status { endpoint: String, status: u16 },

    /// The HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    Client(String),
}
