// Shutdown Token

use tokio::sync::watch;

/// Shutdown signal for graceful termination
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown signal
    ///
    /// Also returns when the sender is dropped.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to every token holder; repeated calls are no-ops
    pub fn shutdown(&self) {
        self.tx.send_if_modified(|stop| !std::mem::replace(stop, true));
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_token_observes_shutdown() {
        let (tx, mut token) = shutdown_channel();
        assert!(!token.is_shutdown());

        tx.shutdown();
        tx.shutdown();

        assert!(token.is_shutdown());
        tokio::time::timeout(Duration::from_secs(1), token.wait())
            .await
            .expect("wait should return after shutdown");
    }

    #[tokio::test]
    async fn test_wait_returns_when_sender_dropped() {
        let (tx, mut token) = shutdown_channel();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), token.wait())
            .await
            .expect("wait should return once the sender is gone");
    }

    #[tokio::test]
    async fn test_clones_share_the_signal() {
        let (tx, token) = shutdown_channel();
        let mut clone = token.clone();

        let waiter = tokio::spawn(async move {
            clone.wait().await;
            clone.is_shutdown()
        });
        tx.shutdown();

        assert!(waiter.await.unwrap());
    }
}
