// Pipeline & worker tuning
use crate::application::retry::Backoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Input/output containers of the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Containers {
    pub input: String,
    pub output: String,
}

impl Default for Containers {
    fn default() -> Self {
        Self {
            input: "input".to_string(),
            output: "output".to_string(),
        }
    }
}

/// Per-job pipeline settings (`pipeline.*`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-document ceiling of the translation backend
    pub max_document_mb: f64,
    /// Per-batch aggregate ceiling
    pub max_batch_mb: f64,
    pub poll_initial_secs: f64,
    pub poll_multiplier: f64,
    pub poll_max_secs: f64,
    /// Wall-clock budget of one batch
    pub poll_timeout_secs: u64,
    pub poll_max_consecutive_errors: u32,
    pub container_token_minutes: u64,
    pub download_token_minutes: u64,
    pub preflight_token_minutes: u64,
    pub clean_output_before_submit: bool,
    pub detail_max_chars: usize,
    pub glossary_sample_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_document_mb: 39.5,
            max_batch_mb: 240.0,
            poll_initial_secs: 3.0,
            poll_multiplier: 1.75,
            poll_max_secs: 20.0,
            poll_timeout_secs: 3600,
            poll_max_consecutive_errors: 5,
            container_token_minutes: 180,
            download_token_minutes: 1440,
            preflight_token_minutes: 30,
            clean_output_before_submit: true,
            detail_max_chars: 4000,
            glossary_sample_bytes: 32 * 1024,
        }
    }
}

impl PipelineConfig {
    pub fn max_document_bytes(&self) -> u64 {
        (self.max_document_mb * MIB) as u64
    }

    pub fn max_batch_bytes(&self) -> u64 {
        (self.max_batch_mb * MIB) as u64
    }

    pub fn poll_backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_secs_f64(self.poll_initial_secs.max(0.0)),
            self.poll_multiplier,
            Duration::from_secs_f64(self.poll_max_secs.max(0.0)),
        )
        .with_max_attempts(self.poll_max_consecutive_errors)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn container_ttl(&self) -> Duration {
        Duration::from_secs(self.container_token_minutes * 60)
    }

    pub fn download_ttl(&self) -> Duration {
        Duration::from_secs(self.download_token_minutes * 60)
    }

    pub fn preflight_ttl(&self) -> Duration {
        Duration::from_secs(self.preflight_token_minutes * 60)
    }
}

/// Dispatcher settings (`worker.*`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Max jobs in flight
    pub concurrency: usize,
    /// Messages requested per receive call
    pub max_messages: u32,
    /// Must exceed the worst-case job duration
    pub visibility_timeout_secs: u64,
    pub idle_sleep_ms: u64,
    /// Deliveries after which a job is failed instead of retried
    pub max_deliveries: u32,
    /// Heartbeat log every N polls
    pub heartbeat_every: u64,
    pub error_backoff_initial_ms: u64,
    pub error_backoff_max_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_messages: 8,
            visibility_timeout_secs: 7200,
            idle_sleep_ms: 1000,
            max_deliveries: 5,
            heartbeat_every: 10,
            error_backoff_initial_ms: 1000,
            error_backoff_max_secs: 30,
        }
    }
}

impl WorkerConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn error_backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.error_backoff_initial_ms),
            2.0,
            Duration::from_secs(self.error_backoff_max_secs),
        )
    }
}
