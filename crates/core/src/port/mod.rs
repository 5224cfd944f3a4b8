// Port Layer - Interfaces for external dependencies

pub mod document;
pub mod drive;
pub mod glossary;
pub mod id_provider;
pub mod job_repository;
pub mod message_queue;
pub mod object_store;
pub mod time_provider;
pub mod translation;

// Re-exports
pub use document::{DocumentConverter, PageSource, PdfEngine};
pub use drive::DriveDelivery;
pub use glossary::GlossaryComposer;
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use message_queue::MessageQueue;
pub use object_store::{AccessScope, ObjectStore, StoredBlob};
pub use time_provider::TimeProvider;
pub use translation::{BatchRequest, TranslationError, TranslationGateway};
