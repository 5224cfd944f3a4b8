// Queue Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Message body placed on the queue by the enqueuing caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: String,
}

impl JobMessage {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "job_id": self.job_id }).to_string()
    }
}

/// A received, not yet acknowledged, queue message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    /// Receipt handle required to delete the message
    pub receipt: String,
    pub body: String,
    /// How many times the message has been handed out, this delivery included
    pub dequeue_count: u32,
}

impl QueueMessage {
    /// Parse the `{job_id}` body
    pub fn job_message(&self) -> Result<JobMessage> {
        let msg: JobMessage = serde_json::from_str(self.body.trim())
            .map_err(|e| DomainError::InvalidMessage(format!("{}: {}", e, self.body)))?;
        if msg.job_id.trim().is_empty() {
            return Err(DomainError::InvalidMessage("empty job_id".to_string()));
        }
        Ok(msg)
    }
}
