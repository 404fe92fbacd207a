//! The `FunctionInvoker` trait and the values it exchanges.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{FunctionEndpoint, TransportError};

/// How the caller wants the provider to run the target function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// The provider acknowledges receipt and runs the function asynchronously.
    FireAndForget,
    /// The provider holds the connection until the function has answered.
    RequestResponse,
}

impl InvocationMode {
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::RequestResponse)
    }
}

/// Connection-phase latencies observed on one outbound call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectTimings {
    pub dns: Duration,
    pub tcp: Duration,
    pub tls: Duration,
}

impl ConnectTimings {
    /// The slowest connection phase, used to scale hint backoff.
    pub fn connect_time(&self) -> Duration {
        self.dns.max(self.tcp).max(self.tls)
    }
}

/// What came back from a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeResponse {
    pub status: u16,
    /// Parsed JSON body, when the provider returned one.
    pub body: Option<Value>,
    pub timings: ConnectTimings,
}

/// Invoke a function hosted by one provider.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(
        &self,
        endpoint: &FunctionEndpoint,
        payload: &Value,
        mode: InvocationMode,
    ) -> Result<InvokeResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_time_is_the_slowest_phase() {
        let timings = ConnectTimings {
            dns: Duration::from_millis(4),
            tcp: Duration::from_millis(11),
            tls: Duration::from_millis(7),
        };
        assert_eq!(timings.connect_time(), Duration::from_millis(11));
        assert_eq!(ConnectTimings::default().connect_time(), Duration::ZERO);
    }
}
