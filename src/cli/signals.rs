//! Shutdown signal handling for the recorder

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

/// Fires once on SIGINT/SIGTERM (Ctrl+C elsewhere)
pub struct ShutdownSignal {
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Get a clone of the shutdown flag
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Mark shutdown as requested and wake the waiter
    pub fn trigger(&self) {
        trigger(&self.shutdown, &self.notify);
    }

    /// Wait until shutdown is requested
    pub async fn wait(&self) {
        if self.is_shutdown() {
            return;
        }
        self.notify.notified().await;
    }

    /// Setup signal handler
    #[cfg(unix)]
    pub async fn setup(&self) -> Result<(), std::io::Error> {
        use tokio::signal::unix::{signal, SignalKind};

        for kind in [SignalKind::interrupt(), SignalKind::terminate()] {
            let mut stream = signal(kind)?;
            let shutdown = Arc::clone(&self.shutdown);
            let notify = Arc::clone(&self.notify);
            tokio::spawn(async move {
                if stream.recv().await.is_some() {
                    debug!(signal = ?kind, "Received shutdown signal");
                    trigger(&shutdown, &notify);
                }
            });
        }
        Ok(())
    }

    /// Setup signal handler
    #[cfg(not(unix))]
    pub async fn setup(&self) -> Result<(), std::io::Error> {
        let shutdown = Arc::clone(&self.shutdown);
        let notify = Arc::clone(&self.notify);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Received Ctrl+C");
                trigger(&shutdown, &notify);
            }
        });
        Ok(())
    }
}

fn trigger(shutdown: &AtomicBool, notify: &Notify) {
    shutdown.store(true, Ordering::SeqCst);
    notify.notify_one();
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
