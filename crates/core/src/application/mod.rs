// Application Layer - Use Cases and Business Logic

pub mod config;
pub mod document;
pub mod glossary;
pub mod job_processor;
pub mod retry;
pub mod translation;
pub mod worker;

// Re-exports
pub use config::{Containers, PipelineConfig, WorkerConfig};
pub use glossary::TermListGlossary;
pub use job_processor::{JobProcessor, PipelineDeps};
pub use retry::Backoff;
pub use translation::TranslationService;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker};
