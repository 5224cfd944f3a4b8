// SQLite JobRepository Implementation

use async_trait::async_trait;
use doctrans_core::domain::{Job, JobDetail, JobStatus};
use doctrans_core::error::{AppError, Result};
use doctrans_core::port::JobRepository;
use sqlx::SqlitePool;
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            Some(code) => match code.as_ref() {
                "2067" | "1555" => AppError::Database(format!(
                    "Unique constraint violation: {} ({})",
                    db_err.message(),
                    code
                )),
                "275" => AppError::Database(format!(
                    "Check constraint violation: {} ({})",
                    db_err.message(),
                    code
                )),
                "5" => AppError::Database(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                other => AppError::Database(format!(
                    "Database error [{}]: {}",
                    other,
                    db_err.message()
                )),
            },
            None => AppError::Database(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Database(format!("Column not found: {}", col)),
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        let detail = encode_detail(job.detail.as_ref())?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, user_id, filename, status, detail,
                source_blob, result_blob, download_url, onedrive_item_id, onedrive_url,
                source_lang, target_lang, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.owning_user_id)
        .bind(&job.filename)
        .bind(job.status.as_str())
        .bind(&detail)
        .bind(&job.source_blob_path)
        .bind(&job.result_blob_path)
        .bind(&job.download_url)
        .bind(&job.onedrive_item_id)
        .bind(&job.onedrive_url)
        .bind(&job.source_lang)
        .bind(&job.target_lang)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(job_id = %job.id, "Job inserted");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn save_terminal(&self, job: &Job) -> Result<()> {
        if !job.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Refusing to persist non-terminal status {} for job {}",
                job.status, job.id
            )));
        }
        let detail = encode_detail(job.detail.as_ref())?;

        // Conditional write: a row already terminal is never touched again
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, detail = ?, result_blob = ?, download_url = ?,
                onedrive_item_id = ?, onedrive_url = ?, updated_at = ?
            WHERE id = ? AND status = 'QUEUED'
            "#,
        )
        .bind(job.status.as_str())
        .bind(&detail)
        .bind(&job.result_blob_path)
        .bind(&job.download_url)
        .bind(&job.onedrive_item_id)
        .bind(&job.onedrive_url)
        .bind(job.updated_at)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?")
            .bind(&job.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match current {
            None => Err(AppError::NotFound(format!("Job {} not found", job.id))),
            Some(status) => Err(AppError::InvalidState(format!(
                "Cannot move job {} from {} to {}",
                job.id, status, job.status
            ))),
        }
    }

    async fn find_by_status(&self, status: Option<JobStatus>, limit: u32) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = match status {
            Some(status) => sqlx::query_as::<_, JobRow>(
                r#"
                SELECT * FROM jobs
                WHERE status = ?
                ORDER BY created_at DESC, id ASC
                LIMIT ?
                "#,
            )
            .bind(status.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query_as::<_, JobRow>(
                r#"
                SELECT * FROM jobs
                ORDER BY created_at DESC, id ASC
                LIMIT ?
                "#,
            )
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

fn encode_detail(detail: Option<&JobDetail>) -> Result<Option<String>> {
    detail
        .map(|d| serde_json::to_string(d).map_err(AppError::from))
        .transpose()
}

/// Rows written by older producers may hold plain text
fn decode_detail(raw: Option<String>) -> Option<JobDetail> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&raw).unwrap_or(JobDetail::Message(raw)))
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    user_id: Option<String>,
    filename: String,
    status: String,
    detail: Option<String>,
    source_blob: String,
    result_blob: Option<String>,
    download_url: Option<String>,
    onedrive_item_id: Option<String>,
    onedrive_url: Option<String>,
    source_lang: String,
    target_lang: String,
    created_at: i64,
    updated_at: i64,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status = JobStatus::parse(&self.status).ok_or_else(|| {
            AppError::Database(format!("Unknown status '{}' for job {}", self.status, self.id))
        })?;

        Ok(Job {
            id: self.id,
            filename: self.filename,
            status,
            detail: decode_detail(self.detail),
            source_blob_path: self.source_blob,
            result_blob_path: self.result_blob,
            download_url: self.download_url,
            onedrive_item_id: self.onedrive_item_id,
            onedrive_url: self.onedrive_url,
            source_lang: self.source_lang,
            target_lang: self.target_lang,
            owning_user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
