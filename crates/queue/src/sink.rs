//! The `CompletionSink` trait and its message types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::QueueError;

/// Queue a terminal step publishes to, as declared in the workflow file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishQueue {
    pub queue_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(default)]
    pub delay_seconds: u32,
}

/// Attributes attached to a published message so consumers can correlate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationAttributes {
    pub execution_uuid: String,
}

/// Acknowledgement of a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkAck {
    pub queue_url: String,
    pub message_id: Option<String>,
}

#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn send(
        &self,
        queue: &FinishQueue,
        message: &Value,
        attributes: &CorrelationAttributes,
    ) -> Result<SinkAck, QueueError>;
}
