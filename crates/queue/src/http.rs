//! HTTP-fronted queue sink.
//!
//! Posts a `SendMessage`-shaped JSON document (`MessageBody`, `DelaySeconds`,
//! `MessageAttributes`) to the queue URL. This matches queues exposed through
//! an HTTP gateway integration.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{CompletionSink, CorrelationAttributes, FinishQueue, QueueError, SinkAck};

#[derive(Debug, Clone)]
pub struct HttpQueueSink {
    http: Client,
}

impl HttpQueueSink {
    pub fn new(timeout: Duration) -> Result<Self, QueueError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::Client(e.to_string()))?;
        Ok(Self { http })
    }
}

pub(crate) fn send_message_document(
    queue: &FinishQueue,
    message: &Value,
    attributes: &CorrelationAttributes,
) -> Value {
    json!({
        "QueueUrl": queue.queue_url,
        "MessageBody": message.to_string(),
        "DelaySeconds": queue.delay_seconds,
        "MessageAttributes": {
            "executionUuid": {
                "DataType": "String",
                "StringValue": attributes.execution_uuid,
            }
        }
    })
}

#[async_trait]
impl CompletionSink for HttpQueueSink {
    async fn send(
        &self,
        queue: &FinishQueue,
        message: &Value,
        attributes: &CorrelationAttributes,
    ) -> Result<SinkAck, QueueError> {
        let document = send_message_document(queue, message, attributes);

        let response = self
            .http
            .post(&queue.queue_url)
            .json(&document)
            .send()
            .await
            .map_err(|e| {
                error!(queue_url = %queue.queue_url, "final state was not published: {e}");
                QueueError::Publish {
                    queue_url: queue.queue_url.clone(),
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueueError::Rejected {
                queue_url: queue.queue_url.clone(),
                status: status.as_u16(),
            });
        }

        let message_id = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("MessageId").and_then(Value::as_str).map(str::to_owned));

        info!(
            queue_url = %queue.queue_url,
            execution_uuid = %attributes.execution_uuid,
            "final state published"
        );

        Ok(SinkAck {
            queue_url: queue.queue_url.clone(),
            message_id,
        })
    }
}
