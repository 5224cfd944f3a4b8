// Error type shared by the pipeline, the ports and every adapter

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Object store error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Document processing failed: {0}")]
    Document(String),

    #[error("Translation error: {0}")]
    Translation(#[from] crate::port::TranslationError),

    #[error("Drive delivery failed: {0}")]
    Drive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transient infrastructure fault: the queue message must be redelivered
    /// instead of the job being failed.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Storage(_)
                | AppError::Queue(_)
                | AppError::Io(_)
                | AppError::Internal(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::TranslationError;

    #[test]
    fn test_infrastructure_classification() {
        assert!(AppError::Storage("503".into()).is_infrastructure());
        assert!(AppError::Database("locked".into()).is_infrastructure());
        assert!(!AppError::Validation("bad".into()).is_infrastructure());
        assert!(!AppError::Document("corrupt".into()).is_infrastructure());
        assert!(!AppError::from(TranslationError::MissingHandle).is_infrastructure());
    }
}
