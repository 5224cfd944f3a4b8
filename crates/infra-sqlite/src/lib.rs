// Doctrans Infrastructure - SQLite Adapter
// Implements: JobRepository

mod connection;
mod job_repository;
mod migration;

pub use connection::create_pool;
pub use job_repository::SqliteJobRepository;
pub use migration::run_migrations;

// sqlx::Error is mapped inside job_repository.rs; orphan rules rule out
// a From<sqlx::Error> for AppError here
