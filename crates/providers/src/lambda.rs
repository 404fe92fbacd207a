//! AWS Lambda adapter.
//!
//! Lambda selects asynchronous execution through the `X-Amz-Invocation-Type`
//! header: `Event` queues the invocation and returns immediately, while
//! `RequestResponse` waits for the function's answer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::http::{build_client, send_timed};
use crate::{FunctionEndpoint, FunctionInvoker, InvocationMode, InvokeResponse, TransportError};

const INVOCATION_TYPE_HEADER: &str = "X-Amz-Invocation-Type";
const LOG_TYPE_HEADER: &str = "X-Amz-Log-Type";

#[derive(Debug, Clone)]
pub struct LambdaInvoker {
    http: Client,
}

impl LambdaInvoker {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            http: build_client(timeout)?,
        })
    }
}

fn invocation_type(mode: InvocationMode) -> &'static str {
    match mode {
        InvocationMode::FireAndForget => "Event",
        InvocationMode::RequestResponse => "RequestResponse",
    }
}

#[async_trait]
impl FunctionInvoker for LambdaInvoker {
    async fn invoke(
        &self,
        endpoint: &FunctionEndpoint,
        payload: &Value,
        mode: InvocationMode,
    ) -> Result<InvokeResponse, TransportError> {
        let request = self
            .http
            .post(endpoint.url())
            .header(INVOCATION_TYPE_HEADER, invocation_type(mode))
            .header(LOG_TYPE_HEADER, "None")
            .json(payload);

        send_timed(endpoint, request).await
    }
}
