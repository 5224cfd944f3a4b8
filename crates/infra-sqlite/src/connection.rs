// SQLite Connection Pool Setup

use doctrans_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Create SQLite connection pool with WAL mode
///
/// An in-memory database lives per connection, so `:memory:` URLs get a
/// single-connection pool.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let in_memory = database_url.contains(":memory:");
    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("Invalid database url {}: {}", database_url, e)))?
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let max_connections = if in_memory { 1 } else { 10 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    debug!(url = %database_url, max_connections, "SQLite pool ready");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_pool() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let err = create_pool("postgres://nope").await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
