//! In-process queue.
//!
//! Keeps published messages in memory. Used by tests and by local runs where
//! no durable queue is reachable.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{CompletionSink, CorrelationAttributes, FinishQueue, QueueError, SinkAck};

/// A message accepted by [`MemoryQueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub message_id: String,
    pub queue: FinishQueue,
    pub body: Value,
    pub execution_uuid: String,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryQueue {
    messages: Arc<Mutex<Vec<QueuedMessage>>>,
    reject: bool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that refuses every message.
    pub fn rejecting() -> Self {
        Self {
            messages: Arc::default(),
            reject: true,
        }
    }

    pub fn messages(&self) -> Vec<QueuedMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CompletionSink for MemoryQueue {
    async fn send(
        &self,
        queue: &FinishQueue,
        message: &Value,
        attributes: &CorrelationAttributes,
    ) -> Result<SinkAck, QueueError> {
        if self.reject {
            return Err(QueueError::Rejected {
                queue_url: queue.queue_url.clone(),
                status: 503,
            });
        }

        let message_id = Uuid::new_v4().to_string();
        self.messages.lock().unwrap().push(QueuedMessage {
            message_id: message_id.clone(),
            queue: queue.clone(),
            body: message.clone(),
            execution_uuid: attributes.execution_uuid.clone(),
        });

        Ok(SinkAck {
            queue_url: queue.queue_url.clone(),
            message_id: Some(message_id),
        })
    }
}
