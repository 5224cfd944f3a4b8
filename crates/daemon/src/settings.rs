//! Worker configuration
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults
//! 2. TOML file (`DOCTRANS_CONFIG`, default `~/.doctrans/worker.toml`, optional)
//! 3. Environment variables `DOCTRANS__<SECTION>__<KEY>`
//!    (e.g. `DOCTRANS__WORKER__CONCURRENCY=8`,
//!    `DOCTRANS__TRANSLATOR__API_VERSIONS=2024-05-01,2023-04-01`)

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use doctrans_core::application::{Containers, PipelineConfig, WorkerConfig};
use doctrans_infra_azure::{GraphOptions, TranslatorOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "DOCTRANS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "~/.doctrans/worker.toml";
const ENV_PREFIX: &str = "DOCTRANS";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub translator: TranslatorSettings,
    pub worker: WorkerConfig,
    pub pipeline: PipelineConfig,
    pub converter: ConverterSettings,
    pub glossary: GlossarySettings,
    pub drive: DriveSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://~/.doctrans/jobs.db".to_string(),
        }
    }
}

impl DatabaseSettings {
    /// URL with `~` expanded after the `sqlite://` scheme
    pub fn resolved_url(&self) -> String {
        match self.url.strip_prefix("sqlite://") {
            Some(path) if path.starts_with('~') => {
                format!("sqlite://{}", shellexpand::tilde(path))
            }
            _ => self.url.clone(),
        }
    }

    /// Directory holding a file-backed database, if any
    pub fn parent_dir(&self) -> Option<PathBuf> {
        let url = self.resolved_url();
        let path = url.strip_prefix("sqlite://")?;
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path.starts_with(':') {
            return None;
        }
        Path::new(path).parent().map(Path::to_path_buf)
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub connection_string: String,
    pub input_container: String,
    pub output_container: String,
    pub queue_name: String,
    pub request_timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let containers = Containers::default();
        Self {
            connection_string: String::new(),
            input_container: containers.input,
            output_container: containers.output,
            queue_name: "translation-jobs".to_string(),
            request_timeout_secs: 300,
        }
    }
}

impl StorageSettings {
    pub fn containers(&self) -> Containers {
        Containers {
            input: self.input_container.clone(),
            output: self.output_container.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Connection strings carry the account key
impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("connection_string", &redacted(&self.connection_string))
            .field("input_container", &self.input_container)
            .field("output_container", &self.output_container)
            .field("queue_name", &self.queue_name)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TranslatorSettings {
    pub endpoint: String,
    pub key: String,
    pub region: Option<String>,
    pub api_versions: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            key: String::new(),
            region: None,
            api_versions: vec!["2024-05-01".to_string(), "2023-04-01".to_string()],
            request_timeout_secs: 120,
        }
    }
}

impl TranslatorSettings {
    pub fn options(&self) -> TranslatorOptions {
        TranslatorOptions {
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            key: self.key.clone(),
            region: self.region.clone(),
            api_versions: self.api_versions.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

impl std::fmt::Debug for TranslatorSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorSettings")
            .field("endpoint", &self.endpoint)
            .field("key", &redacted(&self.key))
            .field("region", &self.region)
            .field("api_versions", &self.api_versions)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConverterSettings {
    pub program: String,
    pub timeout_secs: u64,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            program: "soffice".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GlossarySettings {
    /// `source<TAB>target` term list
    pub terms_file: Option<String>,
}

impl GlossarySettings {
    pub fn terms_path(&self) -> Option<PathBuf> {
        self.terms_file
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DriveSettings {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub folder: String,
    pub request_timeout_secs: u64,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            folder: "Translated".to_string(),
            request_timeout_secs: 300,
        }
    }
}

impl DriveSettings {
    /// Graph options when all three credentials are present
    pub fn options(&self) -> Option<GraphOptions> {
        let present = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        Some(GraphOptions {
            tenant_id: present(&self.tenant_id)?,
            client_id: present(&self.client_id)?,
            client_secret: present(&self.client_secret)?,
            folder: self.folder.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}

impl std::fmt::Debug for DriveSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveSettings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_deref().map(redacted))
            .field("folder", &self.folder)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl Settings {
    /// Load from `DOCTRANS_CONFIG` (or the default path) and the process environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = PathBuf::from(shellexpand::tilde(&path).into_owned());
        Self::build(Some(&path), environment())
    }

    fn build(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        let settings: Settings = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    /// Reject settings the worker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.storage.connection_string.trim().is_empty() {
            bail!("storage.connection_string is required");
        }
        if self.translator.endpoint.trim().is_empty() || self.translator.key.trim().is_empty() {
            bail!("translator.endpoint and translator.key are required");
        }
        if self.worker.concurrency == 0 {
            bail!("worker.concurrency must be at least 1");
        }
        let pipeline = &self.pipeline;
        if pipeline.max_document_mb <= 0.0 || pipeline.max_batch_mb < pipeline.max_document_mb {
            bail!(
                "pipeline.max_batch_mb ({}) must be >= pipeline.max_document_mb ({}) > 0",
                pipeline.max_batch_mb,
                pipeline.max_document_mb
            );
        }
        if self.worker.visibility_timeout() <= pipeline.poll_timeout() {
            tracing::warn!(
                visibility_secs = self.worker.visibility_timeout_secs,
                poll_timeout_secs = pipeline.poll_timeout_secs,
                "Visibility timeout does not exceed the batch poll budget; long jobs may be redelivered"
            );
        }
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("translator.api_versions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_with(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::build(None, env_with(&[])).unwrap();
        assert_eq!(settings.worker.concurrency, 5);
        assert_eq!(settings.pipeline.max_batch_mb, 240.0);
        assert_eq!(settings.storage.queue_name, "translation-jobs");
        assert_eq!(settings.translator.api_versions, vec!["2024-05-01", "2023-04-01"]);
        assert_eq!(settings.converter.program, "soffice");
        assert!(settings.drive.options().is_none());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.toml");
        std::fs::write(
            &path,
            r#"
[storage]
connection_string = "AccountName=acct;AccountKey=a2V5"
output_container = "translated"

[translator]
endpoint = "https://example.cognitiveservices.azure.com/"
key = "k"

[worker]
concurrency = 2

[pipeline]
max_document_mb = 15
"#,
        )
        .unwrap();

        let env = env_with(&[
            ("DOCTRANS__WORKER__CONCURRENCY", "8"),
            ("DOCTRANS__TRANSLATOR__API_VERSIONS", "2023-04-01"),
        ]);
        let settings = Settings::build(Some(&path), env).unwrap();

        assert_eq!(settings.worker.concurrency, 8);
        assert_eq!(settings.pipeline.max_document_bytes(), 15 * 1024 * 1024);
        assert_eq!(settings.storage.containers().output, "translated");
        assert_eq!(settings.storage.containers().input, "input");
        assert_eq!(settings.translator.api_versions, vec!["2023-04-01"]);
        assert_eq!(
            settings.translator.options().endpoint,
            "https://example.cognitiveservices.azure.com"
        );
        settings.validate().unwrap();
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::build(Some(&dir.path().join("absent.toml")), env_with(&[])).unwrap();
        assert_eq!(settings.worker.max_messages, 8);
    }

    #[test]
    fn test_batch_ceiling_below_document_ceiling_is_rejected() {
        let mut settings = Settings::default();
        settings.storage.connection_string = "AccountName=a;AccountKey=a2V5".to_string();
        settings.translator.endpoint = "https://t".to_string();
        settings.translator.key = "k".to_string();
        settings.pipeline.max_batch_mb = 10.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_drive_needs_all_credentials() {
        let mut drive = DriveSettings {
            tenant_id: Some("t".to_string()),
            client_id: Some("c".to_string()),
            ..Default::default()
        };
        assert!(drive.options().is_none());

        drive.client_secret = Some("  ".to_string());
        assert!(drive.options().is_none());

        drive.client_secret = Some("s".to_string());
        let options = drive.options().unwrap();
        assert_eq!(options.folder, "Translated");
        assert!(!format!("{:?}", drive).contains("\"s\""));
    }

    #[test]
    fn test_database_url_expansion() {
        let db = DatabaseSettings {
            url: "sqlite:///var/lib/doctrans/jobs.db".to_string(),
        };
        assert_eq!(db.resolved_url(), "sqlite:///var/lib/doctrans/jobs.db");
        assert_eq!(db.parent_dir(), Some(PathBuf::from("/var/lib/doctrans")));

        let memory = DatabaseSettings {
            url: "sqlite::memory:".to_string(),
        };
        assert_eq!(memory.parent_dir(), None);

        let home = DatabaseSettings::default();
        assert!(!home.resolved_url().contains('~'));
    }
}
