// Worker - queue dispatcher feeding a bounded pool of job handlers

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::config::WorkerConfig;
use crate::application::job_processor::JobProcessor;
use crate::domain::QueueMessage;
use crate::error::Result;
use crate::port::MessageQueue;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Polls the queue and runs up to `concurrency` jobs at once
pub struct Worker {
    queue: Arc<dyn MessageQueue>,
    processor: Arc<JobProcessor>,
    config: WorkerConfig,
    permits: Arc<Semaphore>,
}

impl Worker {
    pub fn new(queue: Arc<dyn MessageQueue>, processor: Arc<JobProcessor>, config: WorkerConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            queue,
            processor,
            config,
            permits,
        }
    }

    /// Run the dispatcher loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(
            concurrency = self.config.concurrency,
            max_messages = self.config.max_messages,
            visibility_secs = self.config.visibility_timeout_secs,
            max_deliveries = self.config.max_deliveries,
            "Queue listener started"
        );

        let mut tasks: JoinSet<()> = JoinSet::new();
        let error_backoff = self.config.error_backoff();
        let mut errors = error_backoff.start();
        let mut polls: u64 = 0;

        loop {
            if shutdown.is_shutdown() {
                info!("Worker shutting down");
                break;
            }
            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "Job handler panicked");
                }
            }

            polls += 1;
            if self.config.heartbeat_every > 0 && polls % self.config.heartbeat_every == 0 {
                info!(polls, in_flight = tasks.len(), "Worker heartbeat");
            }

            let free = self.permits.available_permits() as u32;
            if free == 0 {
                tokio::select! {
                    _ = tasks.join_next() => {},
                    _ = shutdown.wait() => {
                        info!("Worker interrupted while saturated");
                        break;
                    }
                }
                continue;
            }

            let max = free
                .min(self.config.max_messages.max(1))
                .min(MAX_MESSAGES_PER_RECEIVE);
            match self.queue.receive(max, self.config.visibility_timeout()).await {
                Ok(messages) if messages.is_empty() => {
                    errors.reset();
                    tokio::select! {
                        _ = sleep(self.config.idle_sleep()) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Ok(messages) => {
                    errors.reset();
                    debug!(count = messages.len(), "Messages received");
                    for message in messages {
                        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                            error!("Worker semaphore closed");
                            break;
                        };
                        tasks.spawn(handle_message(
                            Arc::clone(&self.queue),
                            Arc::clone(&self.processor),
                            self.config.max_deliveries,
                            message,
                            permit,
                        ));
                    }
                }
                Err(e) => {
                    let delay = errors.next_delay();
                    error!(error = %e, delay_ms = delay.as_millis() as u64, "Queue receive failed");
                    tokio::select! {
                        _ = sleep(delay) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }

        self.drain(tasks).await;
        info!("Worker stopped");
        Ok(())
    }

    async fn drain(&self, mut tasks: JoinSet<()>) {
        if tasks.is_empty() {
            return;
        }
        info!(in_flight = tasks.len(), "Waiting for in-flight jobs");
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Job handler panicked");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(remaining = tasks.len(), "Drain timeout, aborting in-flight jobs");
            tasks.shutdown().await;
        }
    }
}

/// Handle one message; acknowledges only when the job was handled
async fn handle_message(
    queue: Arc<dyn MessageQueue>,
    processor: Arc<JobProcessor>,
    max_deliveries: u32,
    message: QueueMessage,
    _permit: OwnedSemaphorePermit,
) {
    let job_id = match message.job_message() {
        Ok(m) => m.job_id,
        Err(e) => {
            warn!(message_id = %message.message_id, error = %e, "Malformed message, deleting");
            acknowledge(queue.as_ref(), &message).await;
            return;
        }
    };

    let outcome = if max_deliveries > 0 && message.dequeue_count > max_deliveries {
        warn!(
            job_id = %job_id,
            deliveries = message.dequeue_count,
            max_deliveries,
            "Delivery limit exceeded, failing job"
        );
        processor.give_up(&job_id, message.dequeue_count).await
    } else {
        info!(job_id = %job_id, delivery = message.dequeue_count, "Message received");
        processor.process_job(&job_id).await
    };

    match outcome {
        Ok(true) => acknowledge(queue.as_ref(), &message).await,
        Ok(false) => debug!(job_id = %job_id, "Message left for redelivery"),
        Err(e) => error!(job_id = %job_id, error = %e, "Job handler error, message left for redelivery"),
    }
}

async fn acknowledge(queue: &dyn MessageQueue, message: &QueueMessage) {
    match queue.delete(message).await {
        Ok(()) => debug!(message_id = %message.message_id, "Message deleted"),
        Err(e) => error!(message_id = %message.message_id, error = %e, "Failed to delete message"),
    }
}
