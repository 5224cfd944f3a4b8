// OneDrive delivery through Microsoft Graph
//
// App-only token (client credentials), upload session into
// /users/{user}/drive/root:/{folder}/{name}, then a best-effort view link.

use crate::connection::http_client;
use crate::error::{status_error, transport_error, Service};
use async_trait::async_trait;
use doctrans_core::domain::DriveItem;
use doctrans_core::error::{AppError, Result};
use doctrans_core::port::DriveDelivery;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::form_urlencoded;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Upload chunk size; a multiple of 320 KiB as the upload session requires
pub const CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Refresh the token this long before it expires
const TOKEN_SLACK: Duration = Duration::from_secs(60);

/// Characters escaped inside a drive path segment
const DRIVE_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'?')
    .add(b'/')
    .add(b'\\')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Folder under the drive root receiving translated files
    pub folder: String,
    pub request_timeout: Duration,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct GraphDrive {
    client: Client,
    options: GraphOptions,
    token: Mutex<Option<CachedToken>>,
}

impl GraphDrive {
    pub fn new(options: GraphOptions) -> Result<Self> {
        Ok(Self {
            client: http_client(options.request_timeout)?,
            options,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_SLACK < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/{}/oauth2/v2.0/token", LOGIN_BASE, self.options.tenant_id);
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.options.client_id)
            .append_pair("client_secret", &self.options.client_secret)
            .append_pair("scope", GRAPH_SCOPE)
            .finish();

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await
            .map_err(|e| transport_error(Service::Drive, "Token request", e))?;
        if !response.status().is_success() {
            return Err(status_error(Service::Drive, "Token request", response).await);
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| transport_error(Service::Drive, "Token request", e))?;

        debug!(expires_in = token.expires_in, "Graph token acquired");
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }

    async fn create_session(&self, token: &str, user_id: &str, file_name: &str) -> Result<String> {
        let url = format!(
            "{}/users/{}/drive/root:/{}:/createUploadSession",
            GRAPH_BASE,
            encode_segment(user_id),
            drive_item_path(&self.options.folder, file_name)
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({"item": {"@microsoft.graph.conflictBehavior": "replace"}}))
            .send()
            .await
            .map_err(|e| transport_error(Service::Drive, "Create upload session", e))?;
        if !response.status().is_success() {
            return Err(status_error(Service::Drive, "Create upload session", response).await);
        }
        let session: UploadSession = response
            .json()
            .await
            .map_err(|e| transport_error(Service::Drive, "Create upload session", e))?;
        Ok(session.upload_url)
    }

    /// PUT every chunk; the last response carries the created item
    async fn upload_chunks(&self, upload_url: &str, data: &[u8]) -> Result<GraphItem> {
        let total = data.len();
        for (start, end) in chunk_ranges(total, CHUNK_SIZE) {
            // Pre-authenticated URL: no bearer token
            let response = self
                .client
                .put(upload_url)
                .header(reqwest::header::CONTENT_LENGTH, (end - start + 1).to_string())
                .header(
                    reqwest::header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, total),
                )
                .body(data[start..=end].to_vec())
                .send()
                .await
                .map_err(|e| transport_error(Service::Drive, "Upload chunk", e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(status_error(Service::Drive, "Upload chunk", response).await);
            }
            if end + 1 == total {
                return response
                    .json()
                    .await
                    .map_err(|e| transport_error(Service::Drive, "Upload chunk", e));
            }
            debug!(uploaded = end + 1, total, "Drive chunk accepted");
        }
        Err(AppError::Drive("Upload finished without an item".to_string()))
    }

    async fn share_link(&self, token: &str, user_id: &str, item_id: &str) -> Result<String> {
        let url = format!(
            "{}/users/{}/drive/items/{}/createLink",
            GRAPH_BASE,
            encode_segment(user_id),
            encode_segment(item_id)
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({"type": "view", "scope": "anonymous"}))
            .send()
            .await
            .map_err(|e| transport_error(Service::Drive, "Create link", e))?;
        if !response.status().is_success() {
            return Err(status_error(Service::Drive, "Create link", response).await);
        }
        let permission: LinkPermission = response
            .json()
            .await
            .map_err(|e| transport_error(Service::Drive, "Create link", e))?;
        Ok(permission.link.web_url)
    }
}

#[async_trait]
impl DriveDelivery for GraphDrive {
    async fn upload(&self, user_id: &str, file_name: &str, data: &[u8]) -> Result<DriveItem> {
        if data.is_empty() {
            return Err(AppError::Drive("Refusing to upload an empty file".to_string()));
        }
        let token = self.access_token().await?;
        let upload_url = self.create_session(&token, user_id, file_name).await?;
        let item = self.upload_chunks(&upload_url, data).await?;

        let web_url = match self.share_link(&token, user_id, &item.id).await {
            Ok(link) => link,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Share link failed, using item URL");
                item.web_url.clone()
            }
        };

        info!(user_id, file_name, item_id = %item.id, bytes = data.len(), "Delivered to drive");
        Ok(DriveItem {
            item_id: item.id,
            web_url,
        })
    }
}

/// Inclusive byte ranges covering `total` bytes
fn chunk_ranges(total: usize, chunk: usize) -> Vec<(usize, usize)> {
    let chunk = chunk.max(1);
    (0..total)
        .step_by(chunk)
        .map(|start| (start, (start + chunk).min(total) - 1))
        .collect()
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, DRIVE_SEGMENT).to_string()
}

/// `folder/sub/name` with each segment escaped; empty folder means drive root
fn drive_item_path(folder: &str, file_name: &str) -> String {
    folder
        .split('/')
        .filter(|s| !s.trim().is_empty())
        .chain(std::iter::once(file_name))
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSession {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphItem {
    id: String,
    #[serde(default)]
    web_url: String,
}

#[derive(Debug, Deserialize)]
struct LinkPermission {
    link: SharingLink,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharingLink {
    web_url: String,
}
