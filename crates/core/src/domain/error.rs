// Domain errors: rule violations that no retry can fix

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// Jobs leave QUEUED exactly once
    #[error("Job {job_id} is already {status}, cannot become {attempted}")]
    JobAlreadyTerminal {
        job_id: String,
        status: String,
        attempted: String,
    },

    #[error("Malformed queue message: {0}")]
    InvalidMessage(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
