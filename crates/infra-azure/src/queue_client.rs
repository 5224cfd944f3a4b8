// Azure Queue Storage adapter (REST, account SAS auth)

use crate::connection::StorageAccount;
use crate::error::{status_error, transport_error, Service};
use crate::sas::{SasSigner, SAS_VERSION};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use doctrans_core::domain::QueueMessage;
use doctrans_core::error::{AppError, Result};
use doctrans_core::port::MessageQueue;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::form_urlencoded;

/// Service limit for `numofmessages`
const MAX_BATCH: u32 = 32;
/// Service limit for `visibilitytimeout` (7 days)
const MAX_VISIBILITY_SECS: u64 = 7 * 24 * 3600;

pub struct AzureQueue {
    client: Client,
    queue_url: String,
    signer: SasSigner,
}

impl AzureQueue {
    pub fn new(account: &StorageAccount, queue_name: &str, client: Client) -> Self {
        Self {
            client,
            queue_url: format!("{}/{}", account.queue_endpoint, queue_name),
            signer: account.signer(),
        }
    }

    /// Create the queue if missing
    pub async fn ensure_queue(&self) -> Result<()> {
        let url = format!("{}?{}", self.queue_url, self.call_sas()?);
        let response = self
            .client
            .put(&url)
            .header("x-ms-version", SAS_VERSION)
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| transport_error(Service::Queue, "Create queue", e))?;

        match response.status() {
            StatusCode::CREATED => {
                info!(queue = %self.queue_url, "Queue created");
                Ok(())
            }
            s if s.is_success() || s == StatusCode::CONFLICT => Ok(()),
            _ => Err(status_error(Service::Queue, "Create queue", response).await),
        }
    }

    fn call_sas(&self) -> Result<String> {
        let expiry = Utc::now() + chrono::Duration::minutes(15);
        self.signer.account_sas(expiry)
    }
}

#[async_trait]
impl MessageQueue for AzureQueue {
    async fn receive(&self, max: u32, visibility: Duration) -> Result<Vec<QueueMessage>> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("numofmessages", &max.clamp(1, MAX_BATCH).to_string())
            .append_pair(
                "visibilitytimeout",
                &visibility.as_secs().clamp(1, MAX_VISIBILITY_SECS).to_string(),
            )
            .finish();
        let url = format!("{}/messages?{}&{}", self.queue_url, query, self.call_sas()?);

        let response = self
            .client
            .get(&url)
            .header("x-ms-version", SAS_VERSION)
            .send()
            .await
            .map_err(|e| transport_error(Service::Queue, "Receive messages", e))?;
        if !response.status().is_success() {
            return Err(status_error(Service::Queue, "Receive messages", response).await);
        }
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Service::Queue, "Receive messages", e))?;

        let messages = parse_messages(&body)?;
        if !messages.is_empty() {
            debug!(count = messages.len(), "Queue messages received");
        }
        Ok(messages)
    }

    async fn delete(&self, message: &QueueMessage) -> Result<()> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("popreceipt", &message.receipt)
            .finish();
        let url = format!(
            "{}/messages/{}?{}&{}",
            self.queue_url,
            message.message_id,
            query,
            self.call_sas()?
        );

        let response = self
            .client
            .delete(&url)
            .header("x-ms-version", SAS_VERSION)
            .send()
            .await
            .map_err(|e| transport_error(Service::Queue, "Delete message", e))?;

        if response.status().is_success() {
            return Ok(());
        }
        if response.status() == StatusCode::NOT_FOUND {
            // Visibility lapsed and another consumer holds the message now
            warn!(message_id = %message.message_id, "Message already gone or receipt stale");
        }
        Err(status_error(Service::Queue, "Delete message", response).await)
    }

    async fn send(&self, body: &str) -> Result<()> {
        let url = format!("{}/messages?{}", self.queue_url, self.call_sas()?);
        let payload = format!(
            "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            STANDARD.encode(body.as_bytes())
        );

        let response = self
            .client
            .post(&url)
            .header("x-ms-version", SAS_VERSION)
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(payload)
            .send()
            .await
            .map_err(|e| transport_error(Service::Queue, "Send message", e))?;

        if !response.status().is_success() {
            return Err(status_error(Service::Queue, "Send message", response).await);
        }
        Ok(())
    }
}

// Get Messages response
#[derive(Debug, Deserialize)]
struct QueueMessagesList {
    #[serde(rename = "QueueMessage", default)]
    messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawMessage {
    message_id: String,
    pop_receipt: String,
    #[serde(default)]
    dequeue_count: u32,
    #[serde(default)]
    message_text: String,
}

fn parse_messages(body: &str) -> Result<Vec<QueueMessage>> {
    let list: QueueMessagesList = quick_xml::de::from_str(body.trim_start_matches('\u{feff}'))
        .map_err(|e| AppError::Queue(format!("Unreadable message list: {}", e)))?;

    Ok(list
        .messages
        .into_iter()
        .map(|raw| QueueMessage {
            message_id: raw.message_id,
            receipt: raw.pop_receipt,
            body: decode_message_text(&raw.message_text),
            dequeue_count: raw.dequeue_count,
        })
        .collect())
}

/// Producers may enqueue raw JSON or base64-encoded JSON
pub(crate) fn decode_message_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }
    STANDARD
        .decode(trimmed)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|decoded| decoded.trim_start().starts_with('{'))
        .unwrap_or_else(|| trimmed.to_string())
}
