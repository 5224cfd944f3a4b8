// Doctrans Core - Domain Logic, Ports & the Translation Job Pipeline
// NO infrastructure dependencies (adapters live in the infra-* crates)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};
