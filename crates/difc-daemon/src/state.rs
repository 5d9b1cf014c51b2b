//! Shared daemon state.

use std::sync::Arc;
use std::time::Instant;

use difc_core::ReferenceMonitor;
use tokio::sync::watch;

/// Shared daemon state handle.
pub type SharedState = Arc<DaemonStateHandle>;

/// The monitor instance this daemon hosts, plus daemon lifecycle bits.
#[derive(Debug)]
pub struct DaemonStateHandle {
    monitor: Arc<ReferenceMonitor>,
    shutdown: watch::Sender<bool>,
    started_at: Instant,
}

impl DaemonStateHandle {
    /// Creates state around a fresh monitor instance.
    #[must_use]
    pub fn new() -> SharedState {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            monitor: Arc::new(ReferenceMonitor::new()),
            shutdown,
            started_at: Instant::now(),
        })
    }

    /// The hosted monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<ReferenceMonitor> {
        &self.monitor
    }

    /// Requests shutdown; accept loops drain on observing it.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// A receiver that resolves once shutdown has been requested.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Seconds since the daemon started.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
