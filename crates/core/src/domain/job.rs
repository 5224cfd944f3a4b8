// Job Domain Model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque job identifier (UUID v4 when created by the CLI)
pub type JobId = String;

/// Job status
///
/// A job stays `Queued` while a worker is processing it; only the terminal
/// outcome is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => Some(JobStatus::Queued),
            "SUCCEEDED" => Some(JobStatus::Succeeded),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic payload attached to a job
///
/// Serialized as `{"kind": "message", "value": "..."}` or
/// `{"kind": "structured", "value": {...}}` so readers never guess the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum JobDetail {
    Message(String),
    Structured(Map<String, Value>),
}

impl JobDetail {
    pub fn message(msg: impl Into<String>) -> Self {
        JobDetail::Message(msg.into())
    }

    /// Build a structured detail with a `reason` tag
    pub fn structured(reason: &str, fields: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        let mut map = Map::new();
        map.insert("reason".to_string(), Value::String(reason.to_string()));
        for (k, v) in fields {
            map.insert(k.to_string(), v);
        }
        JobDetail::Structured(map)
    }

    /// `reason` tag of a structured detail
    pub fn reason(&self) -> Option<&str> {
        match self {
            JobDetail::Message(_) => None,
            JobDetail::Structured(map) => map.get("reason").and_then(Value::as_str),
        }
    }

    /// Short human-readable rendering for the read surface
    pub fn summary(&self) -> String {
        match self {
            JobDetail::Message(msg) => msg.clone(),
            JobDetail::Structured(map) => {
                let reason = map.get("reason").and_then(Value::as_str).unwrap_or("error");
                match map.get("message").and_then(Value::as_str) {
                    Some(msg) => format!("{}: {}", reason, msg),
                    None => Value::Object(map.clone()).to_string(),
                }
            }
        }
    }

    /// Clamp every string inside the detail to `max_chars` characters
    pub fn truncated(self, max_chars: usize) -> Self {
        match self {
            JobDetail::Message(msg) => JobDetail::Message(truncate_chars(&msg, max_chars)),
            JobDetail::Structured(map) => JobDetail::Structured(
                map.into_iter()
                    .map(|(k, v)| match v {
                        Value::String(s) => (k, Value::String(truncate_chars(&s, max_chars))),
                        other => (k, other),
                    })
                    .collect(),
            ),
        }
    }
}

/// Truncate on a char boundary
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Copy of the result placed in the user's external drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveItem {
    pub item_id: String,
    pub web_url: String,
}

/// Fields written on success
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub result_blob_path: String,
    pub download_url: String,
    pub drive_item: Option<DriveItem>,
}

/// Job Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub filename: String,
    pub status: JobStatus,
    pub detail: Option<JobDetail>,

    pub source_blob_path: String,
    pub result_blob_path: Option<String>,
    pub download_url: Option<String>,
    pub onedrive_item_id: Option<String>,
    pub onedrive_url: Option<String>,

    pub source_lang: String,
    pub target_lang: String,
    pub owning_user_id: Option<String>,

    pub created_at: i64, // epoch seconds
    pub updated_at: i64, // epoch seconds
}

impl Job {
    /// Create a new QUEUED job
    ///
    /// `id` and `created_at` are injected so callers control determinism.
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        filename: impl Into<String>,
        source_blob_path: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            status: JobStatus::Queued,
            detail: None,
            source_blob_path: source_blob_path.into(),
            result_blob_path: None,
            download_url: None,
            onedrive_item_id: None,
            onedrive_url: None,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            owning_user_id: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn with_owner(mut self, user_id: impl Into<String>) -> Self {
        self.owning_user_id = Some(user_id.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Target language, lowercased, `en` when unset
    pub fn target_lang_or_default(&self) -> String {
        let lang = self.target_lang.trim();
        if lang.is_empty() {
            "en".to_string()
        } else {
            lang.to_lowercase()
        }
    }

    /// Source language, `None` for empty or `auto`
    pub fn source_lang_hint(&self) -> Option<&str> {
        let lang = self.source_lang.trim();
        if lang.is_empty() || lang.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(lang)
        }
    }

    /// Transition to SUCCEEDED
    pub fn succeed(&mut self, outcome: JobOutcome, now_secs: i64) -> crate::domain::error::Result<()> {
        self.ensure_open(JobStatus::Succeeded)?;
        self.status = JobStatus::Succeeded;
        self.detail = None;
        self.result_blob_path = Some(outcome.result_blob_path);
        self.download_url = Some(outcome.download_url);
        if let Some(item) = outcome.drive_item {
            self.onedrive_item_id = Some(item.item_id);
            self.onedrive_url = Some(item.web_url);
        }
        self.updated_at = now_secs;
        Ok(())
    }

    /// Transition to FAILED
    pub fn fail(&mut self, detail: JobDetail, now_secs: i64) -> crate::domain::error::Result<()> {
        self.ensure_open(JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.detail = Some(detail);
        self.result_blob_path = None;
        self.download_url = None;
        self.updated_at = now_secs;
        Ok(())
    }

    fn ensure_open(&self, to: JobStatus) -> crate::domain::error::Result<()> {
        if self.status.is_terminal() {
            return Err(crate::domain::error::DomainError::JobAlreadyTerminal {
                job_id: self.id.clone(),
                status: self.status.to_string(),
                attempted: to.to_string(),
            });
        }
        Ok(())
    }

    /// Read surface consumed by callers
    pub fn record(&self) -> JobRecord {
        JobRecord {
            job_id: self.id.clone(),
            status: self.status,
            filename: self.filename.clone(),
            download_url: self.download_url.clone(),
            onedrive_url: self.onedrive_url.clone(),
            result_blob: self.result_blob_path.clone(),
            detail: self.detail.as_ref().map(JobDetail::summary),
        }
    }
}

/// Job record read surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    pub filename: String,
    pub download_url: Option<String>,
    pub onedrive_url: Option<String>,
    pub result_blob: Option<String>,
    pub detail: Option<String>,
}
