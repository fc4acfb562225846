//! Graceful shutdown handling for the restart tracker
//!
//! SIGTERM and SIGINT flip a watch channel that the HTTP server and the
//! eviction sweeper both listen on:
//! - The server stops accepting connections and drains in-flight requests
//! - The sweeper leaves its loop after the current pass

use tokio::sync::watch;
use tracing::info;

/// Receiving half of the shutdown channel
///
/// Cheap to clone; every clone observes the same shutdown.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for shutdown signal
    pub async fn wait(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                // Sender dropped, treat as shutdown
                break;
            }
        }
    }

    /// Check if shutdown was signaled (non-blocking)
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Sending half of the shutdown channel, owned by `main`
pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl ShutdownController {
    /// Trigger shutdown
    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
        info!("Shutdown signal sent");
    }
}

/// Create a new shutdown signal pair
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownController { sender }, ShutdownSignal { receiver })
}

/// Wait for SIGTERM or SIGINT
///
/// Returns the name of the signal received. If the Unix handlers cannot be
/// registered, falls back to Ctrl+C.
#[cfg(unix)]
pub async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::error;

    let handlers = signal(SignalKind::terminate())
        .and_then(|sigterm| signal(SignalKind::interrupt()).map(|sigint| (sigterm, sigint)));

    let (mut sigterm, mut sigint) = match handlers {
        Ok(handlers) => handlers,
        Err(e) => {
            error!(error = %e, "Failed to register signal handlers, falling back to Ctrl+C");
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
            "SIGTERM"
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
            "SIGINT"
        }
    }
}

/// Wait for Ctrl+C (non-Unix platforms)
#[cfg(not(unix))]
pub async fn wait_for_signal() -> &'static str {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to wait for Ctrl+C");
        // Without any handler the process can only stop by being killed
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C");
    "CTRL_C"
}
