//! Queue worker against the SQLite job store: acknowledgment, duplicates and
//! the delivery limit

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_config, pdf_with_pages, Harness};
use doctrans_core::application::{shutdown_channel, ShutdownSender, WorkerConfig, Worker};
use doctrans_core::domain::{JobMessage, JobStatus};
use doctrans_core::port::message_queue::mocks::InMemoryQueue;
use doctrans_core::port::translation::mocks::MockBehavior;
use doctrans_core::port::JobRepository;
use tokio::task::JoinHandle;

const WAIT_LIMIT: Duration = Duration::from_secs(10);

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        concurrency: 2,
        max_messages: 4,
        visibility_timeout_secs: 1,
        idle_sleep_ms: 10,
        max_deliveries: 1,
        heartbeat_every: 0,
        error_backoff_initial_ms: 10,
        error_backoff_max_secs: 1,
    }
}

struct Running {
    sender: ShutdownSender,
    handle: JoinHandle<doctrans_core::Result<()>>,
}

impl Running {
    async fn stop(self) {
        self.sender.shutdown();
        self.handle.await.unwrap().unwrap();
    }
}

fn start(h: &Harness, queue: &Arc<InMemoryQueue>) -> Running {
    let processor = Arc::new(h.processor(fast_config(), None));
    let worker = Worker::new(queue.clone(), processor, worker_config());
    let (sender, token) = shutdown_channel();
    let handle = tokio::spawn(async move { worker.run(token).await });
    Running { sender, handle }
}

/// Poll `check` until it holds or the wait limit passes
async fn wait_for(check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_queued_jobs_succeed_and_messages_are_deleted() {
    let h = Harness::new(MockBehavior::Succeed).await;
    let queue = Arc::new(InMemoryQueue::new());
    for id in ["job-a", "job-b"] {
        h.seed(id, "memo.pdf", pdf_with_pages(&["Memo"], 10), None).await;
        queue.push(JobMessage::new(id).to_json());
    }

    let running = start(&h, &queue);
    assert!(wait_for(|| queue.is_empty()).await);
    running.stop().await;

    assert_eq!(queue.deleted_count(), 2);
    assert_eq!(h.jobs.count_by_status(JobStatus::Succeeded).await.unwrap(), 2);
    assert_eq!(
        h.job("job-b").await.result_blob_path.as_deref(),
        Some("jobs/job-b/input/memo_ja.pdf")
    );
}

#[tokio::test]
async fn test_malformed_message_is_dropped() {
    let h = Harness::new(MockBehavior::Succeed).await;
    let queue = Arc::new(InMemoryQueue::new());
    queue.push("{not json");

    let running = start(&h, &queue);
    assert!(wait_for(|| queue.is_empty()).await);
    running.stop().await;

    assert_eq!(queue.deleted_count(), 1);
    assert_eq!(h.translator.submit_count(), 0);
}

#[tokio::test]
async fn test_duplicate_messages_translate_once() {
    let h = Harness::new(MockBehavior::Succeed).await;
    let queue = Arc::new(InMemoryQueue::new());
    h.seed("job-d", "memo.pdf", pdf_with_pages(&["Memo"], 10), None).await;
    queue.push(JobMessage::new("job-d").to_json());
    queue.push(JobMessage::new("job-d").to_json());

    let running = start(&h, &queue);
    assert!(wait_for(|| queue.is_empty()).await);
    running.stop().await;

    assert_eq!(queue.deleted_count(), 2);
    assert_eq!(h.translator.submit_count(), 1);
    assert_eq!(h.job("job-d").await.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn test_message_past_delivery_limit_fails_the_job() {
    let h = Harness::new(MockBehavior::Succeed).await;
    let queue = Arc::new(InMemoryQueue::new());
    h.seed("job-p", "memo.pdf", pdf_with_pages(&["Memo"], 10), None).await;
    queue.push(JobMessage::new("job-p").to_json());
    h.store.set_fail_reads(true);

    let running = start(&h, &queue);
    assert!(wait_for(|| queue.is_empty()).await);
    running.stop().await;

    let job = h.job("job-p").await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.record().detail.as_deref(),
        Some("delivery_limit: gave up after 2 deliveries")
    );
    assert_eq!(h.translator.submit_count(), 0);
}
