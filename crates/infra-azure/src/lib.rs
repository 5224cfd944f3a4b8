// Doctrans Infrastructure - Azure Adapters
// Implements: ObjectStore (Blob), MessageQueue (Queue), TranslationGateway
// (Document Translation), DriveDelivery (Microsoft Graph)

mod connection;
mod error;
pub mod sas;

pub mod blob_store;
pub mod graph_drive;
pub mod queue_client;
pub mod translator;

pub use blob_store::AzureBlobStore;
pub use connection::{http_client, StorageAccount};
pub use graph_drive::{GraphDrive, GraphOptions};
pub use queue_client::AzureQueue;
pub use sas::SasSigner;
pub use translator::{AzureDocumentTranslator, PreferredEndpoint, TranslatorOptions};
