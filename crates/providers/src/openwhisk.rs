//! Apache OpenWhisk adapter.
//!
//! OpenWhisk actions are invoked through the REST API with HTTP basic auth;
//! the `blocking` query flag selects between asynchronous activation and
//! waiting for the result.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::http::{build_client, send_timed};
use crate::{FunctionEndpoint, FunctionInvoker, InvocationMode, InvokeResponse, TransportError};

/// API key pair used for basic auth against the OpenWhisk controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenWhiskCredentials {
    pub api_key: String,
    pub api_password: String,
}

#[derive(Debug, Clone)]
pub struct OpenWhiskInvoker {
    http: Client,
    credentials: OpenWhiskCredentials,
}

impl OpenWhiskInvoker {
    pub fn new(
        credentials: OpenWhiskCredentials,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            http: build_client(timeout)?,
            credentials,
        })
    }
}

fn blocking_flag(mode: InvocationMode) -> &'static str {
    if mode.is_blocking() {
        "true"
    } else {
        "false"
    }
}

#[async_trait]
impl FunctionInvoker for OpenWhiskInvoker {
    async fn invoke(
        &self,
        endpoint: &FunctionEndpoint,
        payload: &Value,
        mode: InvocationMode,
    ) -> Result<InvokeResponse, TransportError> {
        let request = self
            .http
            .post(endpoint.url())
            .query(&[("blocking", blocking_flag(mode))])
            .basic_auth(&self.credentials.api_key, Some(&self.credentials.api_password))
            .json(payload);

        send_timed(endpoint, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_flag_follows_invocation_mode() {
        assert_eq!(blocking_flag(InvocationMode::FireAndForget), "false");
        assert_eq!(blocking_flag(InvocationMode::RequestResponse), "true");
    }
}
