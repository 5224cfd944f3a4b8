// Translation Service - submit a batch, poll it to a terminal status
use crate::application::retry::Backoff;
use crate::domain::{BatchReport, OperationHandle};
use crate::port::{BatchRequest, TranslationError, TranslationGateway};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct TranslationService {
    gateway: Arc<dyn TranslationGateway>,
    backoff: Backoff,
    timeout: Duration,
}

impl TranslationService {
    pub fn new(gateway: Arc<dyn TranslationGateway>, backoff: Backoff, timeout: Duration) -> Self {
        Self {
            gateway,
            backoff,
            timeout,
        }
    }

    /// Start one remote batch. Not retried here.
    pub async fn submit_batch(&self, request: &BatchRequest) -> Result<OperationHandle, TranslationError> {
        info!(
            prefix = %request.source_prefix,
            target_lang = %request.target_lang,
            source_lang = request.source_lang.as_deref().unwrap_or("auto"),
            glossary = request.glossary_url.is_some(),
            "Submitting translation batch"
        );
        let handle = self.gateway.submit(request).await?;
        info!(handle = %handle, "Translation batch accepted");
        Ok(handle)
    }

    /// Poll until the remote status is terminal or the wall-clock budget runs out
    ///
    /// Transient status errors are tolerated up to the policy's max attempts
    /// in a row.
    ///
    /// # Errors
    /// - TranslationError::Timeout when the budget is exhausted
    /// - the last status error once consecutive failures exceed the policy
    pub async fn poll_batch(&self, handle: &OperationHandle) -> Result<BatchReport, TranslationError> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut delays = self.backoff.start();
        let mut failures: u32 = 0;

        loop {
            match self.gateway.status(handle).await {
                Ok(report) if report.status.is_terminal() => {
                    info!(
                        handle = %handle,
                        status = ?report.status,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Translation batch finished"
                    );
                    return Ok(report);
                }
                Ok(report) => {
                    failures = 0;
                    debug!(handle = %handle, status = ?report.status, "Translation batch in progress");
                }
                Err(e) => {
                    failures += 1;
                    if !self.backoff.allows(failures) {
                        warn!(handle = %handle, failures, error = %e, "Giving up on status polling");
                        return Err(e);
                    }
                    warn!(handle = %handle, failures, error = %e, "Status poll failed, will retry");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(handle = %handle, timeout_secs = self.timeout.as_secs(), "Translation batch timed out");
                return Err(TranslationError::Timeout(self.timeout.as_secs()));
            }
            let delay = delays.next_delay().min(deadline - now);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RemoteStatus;
    use crate::port::object_store::mocks::InMemoryObjectStore;
    use crate::port::translation::mocks::{MockBehavior, MockTranslator};
    use serde_json::json;

    fn request() -> BatchRequest {
        BatchRequest {
            source_url: "memory://input?sp=rl".to_string(),
            source_prefix: "jobs/j1/parts/b01".to_string(),
            target_url: "memory://output?sp=racwl".to_string(),
            target_lang: "id".to_string(),
            source_lang: None,
            glossary_url: None,
        }
    }

    fn service(translator: Arc<MockTranslator>, timeout_secs: u64) -> TranslationService {
        TranslationService::new(translator, Backoff::polling(), Duration::from_secs(timeout_secs))
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_waits_through_running_states() {
        let store = Arc::new(InMemoryObjectStore::new());
        let translator = Arc::new(MockTranslator::new_success(store).with_running_polls(3));
        let svc = service(translator.clone(), 3600);

        let handle = svc.submit_batch(&request()).await.unwrap();
        let report = svc.poll_batch(&handle).await.unwrap();

        assert_eq!(report.status, RemoteStatus::Succeeded);
        assert_eq!(translator.poll_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_is_returned_not_raised() {
        let store = Arc::new(InMemoryObjectStore::new());
        let payload = json!({"status": "Failed", "error": {"code": "InvalidDocument"}});
        let translator = Arc::new(MockTranslator::new(store, MockBehavior::Fail(payload.clone())));
        let svc = service(translator, 3600);

        let handle = svc.submit_batch(&request()).await.unwrap();
        let report = svc.poll_batch(&handle).await.unwrap();
        assert_eq!(report.status, RemoteStatus::Failed);
        assert_eq!(report.payload, payload);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_terminal_times_out() {
        let store = Arc::new(InMemoryObjectStore::new());
        let translator = Arc::new(MockTranslator::new(store, MockBehavior::NeverFinish));
        let svc = service(translator.clone(), 3600);

        let handle = svc.submit_batch(&request()).await.unwrap();
        let started = Instant::now();
        let err = svc.poll_batch(&handle).await.unwrap_err();

        assert!(matches!(err, TranslationError::Timeout(3600)));
        assert!(started.elapsed() >= Duration::from_secs(3600));
        assert!(started.elapsed() < Duration::from_secs(3600 + 21));
        // 3s growing to a 20s cap: well under one poll per second
        assert!(translator.poll_count() < 3600 / 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_poll_errors_give_up() {
        let store = Arc::new(InMemoryObjectStore::new());
        let translator = Arc::new(MockTranslator::new(store, MockBehavior::NeverFinish));
        let svc = service(translator.clone(), 3600);

        let handle = svc.submit_batch(&request()).await.unwrap();
        translator.set_behavior(MockBehavior::PollError);
        let err = svc.poll_batch(&handle).await.unwrap_err();

        assert!(matches!(err, TranslationError::PollFailed(_)));
        assert_eq!(translator.poll_count(), 5);
    }

    #[tokio::test]
    async fn test_rejected_submit_propagates() {
        let store = Arc::new(InMemoryObjectStore::new());
        let translator = Arc::new(MockTranslator::new(store, MockBehavior::RejectSubmit(400)));
        let svc = service(translator, 3600);

        let err = svc.submit_batch(&request()).await.unwrap_err();
        assert!(matches!(err, TranslationError::Rejected { status: 400, .. }));
    }
}
