//! Shutdown coordination.

use tokio::sync::broadcast;

use crate::lifecycle::signals::shutdown_signal;

/// Broadcasts a single "stop now" event to the server and background tasks.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver that yields once shutdown has been triggered.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Trigger shutdown when SIGINT or SIGTERM arrives.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger_on_signal(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.trigger();
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut watcher = shutdown.clone().subscribe();

        shutdown.trigger();
        assert!(server.recv().await.is_ok());
        assert!(watcher.recv().await.is_ok());
    }

    #[test]
    fn test_trigger_without_subscribers_is_noop() {
        Shutdown::default().trigger();
    }
}
