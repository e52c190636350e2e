//! Stop signal shared by the node's background tasks and the HTTP server.
//!
//! The signal is a latched flag on a `tokio::sync::watch` channel: once set
//! it stays set, so a task that subscribes after `stop()` began still sees
//! it and exits instead of waiting forever.

use tokio::sync::watch;

/// Owner side of the stop signal. `PrismNode` keeps it in an `Arc`.
pub struct ShutdownController {
    stopping: watch::Sender<bool>,
}

/// Receiver side, one per task.
#[derive(Clone)]
pub struct ShutdownSignal {
    stopping: watch::Receiver<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (stopping, _) = watch::channel(false);
        Self { stopping }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            stopping: self.stopping.subscribe(),
        }
    }

    /// Set the flag. Calling it again has no effect.
    pub fn shutdown(&self) {
        let already = self.stopping.send_replace(true);
        if !already {
            tracing::debug!(tasks = self.stopping.receiver_count(), "stop signal sent");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.stopping.borrow()
    }

    /// Block until the process gets SIGINT or SIGTERM, then set the flag.
    pub async fn wait_for_signal(&self) {
        let name = os_signal().await;
        tracing::info!(signal = name, "stopping on signal");
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Resolve once the flag is set, or once the controller is gone.
    /// Cancel safe, so it can sit in a `select!` loop.
    pub async fn wait(&mut self) {
        while !*self.stopping.borrow_and_update() {
            if self.stopping.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(unix)]
async fn os_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = term.recv() => "SIGTERM",
        },
        Err(e) => {
            tracing::warn!(error = %e, "no SIGTERM handler, listening for SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn os_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "ctrl-c"
}
