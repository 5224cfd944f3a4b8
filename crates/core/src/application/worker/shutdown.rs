// Stop signal shared by the daemon and the queue listener

use tokio::sync::watch;

/// Receiving side, held by the listener loop
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop was requested (immediately if it already was).
    /// A dropped sender counts as a stop request.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Sending side, held by the daemon's signal handler
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_after_stop_was_already_requested() {
        let (sender, mut token) = shutdown_channel();
        assert!(!token.is_shutdown());

        sender.shutdown();
        tokio::time::timeout(Duration::from_secs(1), token.wait())
            .await
            .unwrap();
        assert!(token.is_shutdown());
    }

    #[tokio::test]
    async fn test_clones_observe_the_same_signal() {
        let (sender, token) = shutdown_channel();
        let mut other = token.clone();
        let waiter = tokio::spawn(async move { other.wait().await });

        sender.shutdown();
        waiter.await.unwrap();
        assert!(token.is_shutdown());
    }
}
