// Message Queue Port (Interface)
// At-least-once delivery with a visibility window and explicit acknowledgment

use crate::domain::QueueMessage;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Receive up to `max` messages, hiding them for `visibility`
    async fn receive(&self, max: u32, visibility: Duration) -> Result<Vec<QueueMessage>>;

    /// Acknowledge (delete) a received message using its receipt
    async fn delete(&self, message: &QueueMessage) -> Result<()>;

    /// Enqueue a message body
    async fn send(&self, body: &str) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct Entry {
        id: String,
        body: String,
        visible_at: Instant,
        dequeue_count: u32,
        receipt: Option<String>,
    }

    /// In-memory queue honoring visibility timeouts (tokio clock, so paused
    /// test time applies)
    #[derive(Default)]
    pub struct InMemoryQueue {
        entries: Mutex<Vec<Entry>>,
        next_id: AtomicUsize,
        deleted: AtomicUsize,
        fail_receive: AtomicBool,
    }

    impl InMemoryQueue {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, body: impl Into<String>) {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.entries.lock().unwrap().push(Entry {
                id: format!("msg-{}", n),
                body: body.into(),
                visible_at: Instant::now(),
                dequeue_count: 0,
                receipt: None,
            });
        }

        /// Messages still held by the queue (visible or not)
        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        pub fn deleted_count(&self) -> usize {
            self.deleted.load(Ordering::SeqCst)
        }

        pub fn bodies(&self) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.body.clone())
                .collect()
        }

        pub fn set_fail_receive(&self, fail: bool) {
            self.fail_receive.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl MessageQueue for InMemoryQueue {
        async fn receive(&self, max: u32, visibility: Duration) -> Result<Vec<QueueMessage>> {
            if self.fail_receive.load(Ordering::SeqCst) {
                return Err(AppError::Queue("injected receive failure".to_string()));
            }
            let now = Instant::now();
            let mut entries = self.entries.lock().unwrap();
            let mut out = Vec::new();
            for entry in entries.iter_mut() {
                if out.len() as u32 >= max {
                    break;
                }
                if entry.visible_at > now {
                    continue;
                }
                entry.dequeue_count += 1;
                entry.visible_at = now + visibility;
                let receipt = format!("{}-r{}", entry.id, entry.dequeue_count);
                entry.receipt = Some(receipt.clone());
                out.push(QueueMessage {
                    message_id: entry.id.clone(),
                    receipt,
                    body: entry.body.clone(),
                    dequeue_count: entry.dequeue_count,
                });
            }
            Ok(out)
        }

        async fn delete(&self, message: &QueueMessage) -> Result<()> {
            let mut entries = self.entries.lock().unwrap();
            let pos = entries
                .iter()
                .position(|e| e.id == message.message_id)
                .ok_or_else(|| AppError::Queue(format!("message {} not found", message.message_id)))?;
            if entries[pos].receipt.as_deref() != Some(message.receipt.as_str()) {
                return Err(AppError::Queue(format!(
                    "stale receipt for message {}",
                    message.message_id
                )));
            }
            entries.remove(pos);
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&self, body: &str) -> Result<()> {
            self.push(body);
            Ok(())
        }
    }
}
