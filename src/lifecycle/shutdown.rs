//! Shutdown coordination for the gateway's background sweepers.

use tokio::sync::broadcast;

/// Broadcast-based shutdown signal.
///
/// The rate-limit and fallback-cache sweepers each hold a subscription
/// and exit their tick loop when the signal fires. Tests trigger it
/// directly to stop sweepers deterministically.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Hand out a receiver for one background task.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscribed task to stop.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
