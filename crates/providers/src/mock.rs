//! `RecordingInvoker`: a test double for `FunctionInvoker`.
//!
//! Records every call instead of touching the network, and can be scripted to
//! fail for particular hosts or to report fixed connection timings.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    ConnectTimings, FunctionEndpoint, FunctionInvoker, InvocationMode, InvokeResponse,
    TransportError,
};

/// One captured invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: FunctionEndpoint,
    pub payload: Value,
    pub mode: InvocationMode,
}

#[derive(Debug, Default, Clone)]
pub struct RecordingInvoker {
    /// All calls seen by this invoker (in call order). Shared between clones.
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
    timings: ConnectTimings,
    response: Option<Value>,
    failing_hosts: HashSet<String>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report these timings on every successful call.
    pub fn with_timings(mut self, timings: ConnectTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Return this body on every successful call.
    pub fn with_response(mut self, body: Value) -> Self {
        self.response = Some(body);
        self
    }

    /// Fail every call addressed to `hostname` (the call is still recorded).
    pub fn failing_for(mut self, hostname: impl Into<String>) -> Self {
        self.failing_hosts.insert(hostname.into());
        self
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Calls addressed to `hostname`.
    pub fn calls_to(&self, hostname: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.endpoint.hostname == hostname)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl FunctionInvoker for RecordingInvoker {
    async fn invoke(
        &self,
        endpoint: &FunctionEndpoint,
        payload: &Value,
        mode: InvocationMode,
    ) -> Result<InvokeResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            endpoint: endpoint.clone(),
            payload: payload.clone(),
            mode,
        });

        if self.failing_hosts.contains(&endpoint.hostname) {
            return Err(TransportError::Request {
                endpoint: endpoint.to_string(),
                message: "connection refused".into(),
            });
        }

        Ok(InvokeResponse {
            status: 202,
            body: self.response.clone(),
            timings: self.timings,
        })
    }
}
