// Storage account settings and the shared HTTP client

use crate::sas::SasSigner;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use doctrans_core::error::{AppError, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Well-known Azurite development account
const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Parsed storage connection string
#[derive(Clone)]
pub struct StorageAccount {
    pub name: String,
    key: Vec<u8>,
    pub blob_endpoint: String,
    pub queue_endpoint: String,
}

impl std::fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("blob_endpoint", &self.blob_endpoint)
            .field("queue_endpoint", &self.queue_endpoint)
            .finish_non_exhaustive()
    }
}

impl StorageAccount {
    /// Parse `AccountName=..;AccountKey=..[;BlobEndpoint=..][;QueueEndpoint=..]`
    ///
    /// `UseDevelopmentStorage=true` selects the local Azurite emulator.
    pub fn from_connection_string(conn: &str) -> Result<Self> {
        let pairs: HashMap<String, String> = conn
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();

        if pairs
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::new(
                DEV_ACCOUNT,
                DEV_KEY,
                Some(format!("http://127.0.0.1:10000/{}", DEV_ACCOUNT)),
                Some(format!("http://127.0.0.1:10001/{}", DEV_ACCOUNT)),
            );
        }

        let name = pairs
            .get("accountname")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Config("Connection string has no AccountName".to_string()))?;
        let key = pairs
            .get("accountkey")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Config("Connection string has no AccountKey".to_string()))?;

        let protocol = pairs
            .get("defaultendpointsprotocol")
            .map(String::as_str)
            .unwrap_or("https");
        let suffix = pairs
            .get("endpointsuffix")
            .map(String::as_str)
            .unwrap_or("core.windows.net");

        let blob = pairs
            .get("blobendpoint")
            .cloned()
            .or_else(|| Some(format!("{}://{}.blob.{}", protocol, name, suffix)));
        let queue = pairs
            .get("queueendpoint")
            .cloned()
            .or_else(|| Some(format!("{}://{}.queue.{}", protocol, name, suffix)));

        Self::new(name, key, blob, queue)
    }

    fn new(
        name: &str,
        key_b64: &str,
        blob_endpoint: Option<String>,
        queue_endpoint: Option<String>,
    ) -> Result<Self> {
        let key = STANDARD
            .decode(key_b64)
            .map_err(|e| AppError::Config(format!("AccountKey is not valid base64: {}", e)))?;
        Ok(Self {
            name: name.to_string(),
            key,
            blob_endpoint: blob_endpoint.unwrap_or_default().trim_end_matches('/').to_string(),
            queue_endpoint: queue_endpoint.unwrap_or_default().trim_end_matches('/').to_string(),
        })
    }

    pub fn signer(&self) -> SasSigner {
        SasSigner::new(self.name.clone(), self.key.clone())
    }
}

/// Shared client: one connection pool per process
pub fn http_client(request_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}
