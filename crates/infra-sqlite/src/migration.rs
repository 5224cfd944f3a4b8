// Embedded schema migrations, tracked in `schema_version`

use doctrans_core::error::{AppError, Result};
use sqlx::SqlitePool;
use tracing::info;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ascending by version; each script records its own version row
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "jobs table",
    sql: include_str!("../migrations/001_initial_schema.sql"),
}];

/// Bring the schema up to the latest version
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let applied = schema_version(pool).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        info!(version = applied, "Job store schema up to date");
        return Ok(());
    }

    for migration in pending {
        info!(version = migration.version, name = migration.name, "Applying migration");
        let mut tx = pool.begin().await.map_err(migration_error)?;
        for statement in statements(migration.sql) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(migration_error)?;
        }
        tx.commit().await.map_err(migration_error)?;
    }
    Ok(())
}

/// Highest applied version, 0 for a fresh database
async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let tracked: i64 = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
    )
    .fetch_one(pool)
    .await
    .map_err(migration_error)?;
    if tracked == 0 {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(migration_error)?;
    Ok(version.unwrap_or(0))
}

/// Split a script on `;`, dropping `--` comment lines and empty statements
fn statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn migration_error(e: sqlx::Error) -> AppError {
    AppError::Database(format!("migration: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    #[test]
    fn test_statements_skip_comments() {
        let sql = "-- header\nCREATE TABLE a (x INT);\n\n-- note\nINSERT INTO a VALUES (1);\n";
        assert_eq!(
            statements(sql),
            vec!["CREATE TABLE a (x INT)".to_string(), "INSERT INTO a VALUES (1)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fresh_database_gets_jobs_table() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        assert_eq!(schema_version(&pool).await.unwrap(), 0);

        run_migrations(&pool).await.unwrap();

        let jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(jobs, 0);
        assert_eq!(schema_version(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_run_applies_nothing() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
