// Translation Gateway Port (Interface)
// Asynchronous batch document translation: submit, then poll

use crate::domain::{BatchReport, OperationHandle};
use async_trait::async_trait;
use thiserror::Error;

/// One remote batch: source container + prefix filter into a target container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub source_url: String,
    pub source_prefix: String,
    pub target_url: String,
    pub target_lang: String,
    /// `None` lets the service auto-detect
    pub source_lang: Option<String>,
    /// Blob-scoped read URL of a TSV glossary
    pub glossary_url: Option<String>,
}

/// Translation errors
#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("Translator rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Translator returned no operation handle")]
    MissingHandle,

    #[error("No translator endpoint accepted the request: {0}")]
    NoEndpoint(String),

    #[error("Status poll failed: {0}")]
    PollFailed(String),

    #[error("Batch did not finish within {0}s")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed translator response: {0}")]
    Malformed(String),
}

/// Translation Gateway trait
///
/// Implementations:
/// - AzureDocumentTranslator: Azure AI Document Translation REST
#[async_trait]
pub trait TranslationGateway: Send + Sync {
    /// Start a remote batch
    ///
    /// # Errors
    /// - TranslationError::Rejected on a non-success status code
    /// - TranslationError::MissingHandle when the response carries no handle
    async fn submit(&self, request: &BatchRequest) -> Result<OperationHandle, TranslationError>;

    /// Fetch the current status of a remote batch (one request, no waiting)
    async fn status(&self, handle: &OperationHandle) -> Result<BatchReport, TranslationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::RemoteStatus;
    use crate::port::object_store::mocks::InMemoryObjectStore;
    use crate::port::ObjectStore;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    /// Scripted translator behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Copy every source blob under the prefix to the same path in the target
        Succeed,
        /// Like `Succeed` but writes at the bare basename
        SucceedAtBasename,
        /// Report `Failed` with this payload
        Fail(Value),
        /// Report `Running` forever
        NeverFinish,
        /// Reject the submission with this HTTP status
        RejectSubmit(u16),
        /// Answer status polls with a transport error
        PollError,
    }

    /// Scripted translator working against an in-memory object store
    pub struct MockTranslator {
        store: Arc<InMemoryObjectStore>,
        behavior: Mutex<MockBehavior>,
        /// Polls answered `Running` before the terminal status
        running_polls: usize,
        requests: Mutex<Vec<BatchRequest>>,
        polls: Mutex<usize>,
        pending: Mutex<Vec<(OperationHandle, usize)>>,
    }

    impl MockTranslator {
        pub fn new(store: Arc<InMemoryObjectStore>, behavior: MockBehavior) -> Self {
            Self {
                store,
                behavior: Mutex::new(behavior),
                running_polls: 0,
                requests: Mutex::new(Vec::new()),
                polls: Mutex::new(0),
                pending: Mutex::new(Vec::new()),
            }
        }

        pub fn new_success(store: Arc<InMemoryObjectStore>) -> Self {
            Self::new(store, MockBehavior::Succeed)
        }

        pub fn with_running_polls(mut self, polls: usize) -> Self {
            self.running_polls = polls;
            self
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn submit_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn poll_count(&self) -> usize {
            *self.polls.lock().unwrap()
        }

        pub fn requests(&self) -> Vec<BatchRequest> {
            self.requests.lock().unwrap().clone()
        }

        async fn translate(&self, request: &BatchRequest, at_basename: bool) -> Result<(), TranslationError> {
            let (source, _) = InMemoryObjectStore::parse_url(&request.source_url)
                .ok_or_else(|| TranslationError::Malformed(request.source_url.clone()))?;
            let (target, _) = InMemoryObjectStore::parse_url(&request.target_url)
                .ok_or_else(|| TranslationError::Malformed(request.target_url.clone()))?;
            let names = self
                .store
                .list(&source, &request.source_prefix)
                .await
                .map_err(|e| TranslationError::Transport(e.to_string()))?;
            for name in names {
                let Some(blob) = self.store.blob(&source, &name) else {
                    continue;
                };
                let dest = if at_basename {
                    crate::domain::layout::basename(&name)
                } else {
                    name.clone()
                };
                self.store
                    .put(&target, &dest, blob, "application/octet-stream")
                    .await
                    .map_err(|e| TranslationError::Transport(e.to_string()))?;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TranslationGateway for MockTranslator {
        async fn submit(&self, request: &BatchRequest) -> Result<OperationHandle, TranslationError> {
            let behavior = self.behavior.lock().unwrap().clone();
            if let MockBehavior::RejectSubmit(status) = behavior {
                return Err(TranslationError::Rejected {
                    status,
                    body: r#"{"error":{"code":"InvalidRequest"}}"#.to_string(),
                });
            }
            let handle = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.clone());
                OperationHandle::new(format!("mock://batches/{}", requests.len()))
            };
            match behavior {
                MockBehavior::Succeed => self.translate(request, false).await?,
                MockBehavior::SucceedAtBasename => self.translate(request, true).await?,
                _ => {}
            }
            self.pending.lock().unwrap().push((handle.clone(), 0));
            Ok(handle)
        }

        async fn status(&self, handle: &OperationHandle) -> Result<BatchReport, TranslationError> {
            *self.polls.lock().unwrap() += 1;
            let behavior = self.behavior.lock().unwrap().clone();
            if let MockBehavior::PollError = behavior {
                return Err(TranslationError::PollFailed("503 Service Unavailable".to_string()));
            }

            let seen = {
                let mut pending = self.pending.lock().unwrap();
                let entry = pending
                    .iter_mut()
                    .find(|(h, _)| h == handle)
                    .ok_or_else(|| TranslationError::PollFailed(format!("unknown handle {}", handle)))?;
                entry.1 += 1;
                entry.1
            };
            if seen <= self.running_polls {
                return Ok(BatchReport::from_payload(json!({"id": handle.as_str(), "status": "Running"})));
            }

            let report = match behavior {
                MockBehavior::Succeed | MockBehavior::SucceedAtBasename => {
                    BatchReport::from_payload(json!({"id": handle.as_str(), "status": "Succeeded"}))
                }
                MockBehavior::Fail(payload) => BatchReport {
                    status: RemoteStatus::Failed,
                    payload,
                },
                _ => BatchReport::from_payload(json!({"id": handle.as_str(), "status": "Running"})),
            };
            Ok(report)
        }
    }
}
