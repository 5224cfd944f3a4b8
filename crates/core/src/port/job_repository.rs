// Job Repository Port (Interface)

use crate::domain::{Job, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job (enqueuing caller)
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Job>>;

    /// Persist a terminal job
    ///
    /// Only a row still `QUEUED` is written.
    ///
    /// # Errors
    /// - AppError::NotFound if the row does not exist
    /// - AppError::InvalidState if the stored row is already terminal
    async fn save_terminal(&self, job: &Job) -> Result<()>;

    /// Most recent jobs first, optionally filtered by status
    async fn find_by_status(&self, status: Option<JobStatus>, limit: u32) -> Result<Vec<Job>>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory job store with the same conditional-write rule as the SQL adapter
    #[derive(Default)]
    pub struct InMemoryJobRepository {
        jobs: Mutex<HashMap<String, Job>>,
        terminal_writes: Mutex<usize>,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
            let repo = Self::new();
            {
                let mut map = repo.jobs.lock().unwrap();
                for job in jobs {
                    map.insert(job.id.clone(), job);
                }
            }
            repo
        }

        pub fn get(&self, id: &str) -> Option<Job> {
            self.jobs.lock().unwrap().get(id).cloned()
        }

        /// Number of successful terminal writes
        pub fn terminal_writes(&self) -> usize {
            *self.terminal_writes.lock().unwrap()
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &Job) -> Result<()> {
            let mut map = self.jobs.lock().unwrap();
            if map.contains_key(&job.id) {
                return Err(AppError::Database(format!("duplicate job id {}", job.id)));
            }
            map.insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<Job>> {
            Ok(self.get(id))
        }

        async fn save_terminal(&self, job: &Job) -> Result<()> {
            let mut map = self.jobs.lock().unwrap();
            let stored = map
                .get_mut(&job.id)
                .ok_or_else(|| AppError::NotFound(job.id.clone()))?;
            if stored.status.is_terminal() {
                return Err(AppError::InvalidState(format!(
                    "job {} already {}",
                    job.id, stored.status
                )));
            }
            *stored = job.clone();
            *self.terminal_writes.lock().unwrap() += 1;
            Ok(())
        }

        async fn find_by_status(&self, status: Option<JobStatus>, limit: u32) -> Result<Vec<Job>> {
            let map = self.jobs.lock().unwrap();
            let mut jobs: Vec<Job> = map
                .values()
                .filter(|j| status.map_or(true, |s| j.status == s))
                .cloned()
                .collect();
            jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
            jobs.truncate(limit as usize);
            Ok(jobs)
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            let map = self.jobs.lock().unwrap();
            Ok(map.values().filter(|j| j.status == status).count() as i64)
        }
    }
}
