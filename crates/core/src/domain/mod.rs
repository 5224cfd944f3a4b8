// Domain Layer - Pure business logic and entities

pub mod document;
pub mod error;
pub mod job;
pub mod layout;
pub mod queue;

// Re-exports
pub use document::{
    part_name, BatchReport, DocumentFormat, DocumentPart, OperationHandle, RemoteStatus,
    TranslationBatch,
};
pub use error::DomainError;
pub use job::{DriveItem, Job, JobDetail, JobId, JobOutcome, JobRecord, JobStatus};
pub use queue::{JobMessage, QueueMessage};
