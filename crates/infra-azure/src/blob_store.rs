// Azure Blob Storage adapter (REST, account SAS auth)

use crate::connection::StorageAccount;
use crate::error::{status_error, transport_error, Service};
use crate::sas::{encode_blob_path, SasSigner, SAS_VERSION};
use async_trait::async_trait;
use chrono::Utc;
use doctrans_core::error::{AppError, Result};
use doctrans_core::port::{AccessScope, ObjectStore, StoredBlob};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::form_urlencoded;

/// Lifetime of the account SAS minted for each call
const CALL_SAS_TTL: Duration = Duration::from_secs(15 * 60);

pub struct AzureBlobStore {
    client: Client,
    endpoint: String,
    signer: SasSigner,
}

impl AzureBlobStore {
    pub fn new(account: &StorageAccount, client: Client) -> Self {
        Self {
            client,
            endpoint: account.blob_endpoint.clone(),
            signer: account.signer(),
        }
    }

    /// Create the container if missing
    pub async fn ensure_container(&self, container: &str) -> Result<()> {
        let url = format!(
            "{}/{}?restype=container&{}",
            self.endpoint,
            container,
            self.call_sas()?
        );
        let response = self
            .client
            .put(&url)
            .header("x-ms-version", SAS_VERSION)
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| transport_error(Service::Blob, "Create container", e))?;

        match response.status() {
            s if s.is_success() => {
                info!(container, "Container created");
                Ok(())
            }
            StatusCode::CONFLICT => Ok(()),
            _ => Err(status_error(Service::Blob, "Create container", response).await),
        }
    }

    fn call_sas(&self) -> Result<String> {
        self.signer.account_sas(expiry_after(CALL_SAS_TTL)?)
    }

    fn blob_url(&self, container: &str, path: &str) -> String {
        format!("{}/{}/{}", self.endpoint, container, encode_blob_path(path))
    }

    async fn list_page(
        &self,
        container: &str,
        prefix: &str,
        marker: Option<&str>,
    ) -> Result<EnumerationResults> {
        let url = {
            let mut query = form_urlencoded::Serializer::new(String::new());
            query
                .append_pair("restype", "container")
                .append_pair("comp", "list")
                .append_pair("prefix", prefix);
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
            format!(
                "{}/{}?{}&{}",
                self.endpoint,
                container,
                query.finish(),
                self.call_sas()?
            )
        };

        let response = self
            .client
            .get(&url)
            .header("x-ms-version", SAS_VERSION)
            .send()
            .await
            .map_err(|e| transport_error(Service::Blob, "List blobs", e))?;
        if !response.status().is_success() {
            return Err(status_error(Service::Blob, "List blobs", response).await);
        }
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Service::Blob, "List blobs", e))?;
        parse_list(&body)
    }
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn get(&self, container: &str, path: &str) -> Result<Option<StoredBlob>> {
        let url = format!("{}?{}", self.blob_url(container, path), self.call_sas()?);
        let response = self
            .client
            .get(&url)
            .header("x-ms-version", SAS_VERSION)
            .send()
            .await
            .map_err(|e| transport_error(Service::Blob, "Get blob", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(container, path, "Blob not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(Service::Blob, "Get blob", response).await);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response
            .bytes()
            .await
            .map_err(|e| transport_error(Service::Blob, "Get blob", e))?
            .to_vec();

        debug!(container, path, bytes = data.len(), "Blob downloaded");
        Ok(Some(StoredBlob { data, content_type }))
    }

    async fn put(&self, container: &str, path: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let url = format!("{}?{}", self.blob_url(container, path), self.call_sas()?);
        let size = data.len();
        let response = self
            .client
            .put(&url)
            .header("x-ms-version", SAS_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| transport_error(Service::Blob, "Put blob", e))?;

        if !response.status().is_success() {
            return Err(status_error(Service::Blob, "Put blob", response).await);
        }
        debug!(container, path, bytes = size, "Blob uploaded");
        Ok(())
    }

    async fn delete(&self, container: &str, path: &str) -> Result<bool> {
        let url = format!("{}?{}", self.blob_url(container, path), self.call_sas()?);
        let response = self
            .client
            .delete(&url)
            .header("x-ms-version", SAS_VERSION)
            .header("x-ms-delete-snapshots", "include")
            .send()
            .await
            .map_err(|e| transport_error(Service::Blob, "Delete blob", e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(status_error(Service::Blob, "Delete blob", response).await),
        }
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let page = self.list_page(container, prefix, marker.as_deref()).await?;
            names.extend(page.blobs.items.into_iter().map(|b| b.name));
            match page.next_marker.filter(|m| !m.is_empty()) {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        names.sort();
        Ok(names)
    }

    fn container_access_url(&self, container: &str, scope: AccessScope, ttl: Duration) -> Result<String> {
        let sas = self.signer.container_sas(container, scope, expiry_after(ttl)?)?;
        Ok(format!("{}/{}?{}", self.endpoint, container, sas))
    }

    fn blob_access_url(
        &self,
        container: &str,
        path: &str,
        scope: AccessScope,
        ttl: Duration,
    ) -> Result<String> {
        let sas = self.signer.blob_sas(container, path, scope, expiry_after(ttl)?)?;
        Ok(format!("{}?{}", self.blob_url(container, path), sas))
    }

    async fn verify_access(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| transport_error(Service::Blob, "Access check", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Storage(format!(
                "Access check failed ({})",
                response.status().as_u16()
            )))
        }
    }
}

fn expiry_after(ttl: Duration) -> Result<chrono::DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| AppError::Validation(format!("Invalid token lifetime: {}", e)))?;
    Ok(Utc::now() + ttl)
}

// List Blobs response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: BlobList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlobList {
    #[serde(rename = "Blob", default)]
    items: Vec<BlobItem>,
}

#[derive(Debug, Deserialize)]
struct BlobItem {
    #[serde(rename = "Name")]
    name: String,
}

fn parse_list(body: &str) -> Result<EnumerationResults> {
    quick_xml::de::from_str(body.trim_start_matches('\u{feff}'))
        .map_err(|e| AppError::Storage(format!("Unreadable blob listing: {}", e)))
}
