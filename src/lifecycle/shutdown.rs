//! Shutdown fan-out.
//!
//! Two things listen: the HTTP server, which stops accepting and lets
//! in-flight dispatches finish, and the rate limit sweeper. The trigger is
//! latched, so a listener created after the signal still stops at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Owner of the shutdown trigger. Hands out [`ShutdownListener`]s.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    fired: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
            fired: self.fired.clone(),
        }
    }

    /// Fire once; later calls are no-ops.
    pub fn trigger(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Listeners not yet dropped.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// One task's view of the trigger.
pub struct ShutdownListener {
    rx: broadcast::Receiver<()>,
    fired: Arc<AtomicBool>,
}

impl ShutdownListener {
    /// A second listener on the same trigger, for a task spawned alongside.
    pub fn fork(&self) -> Self {
        Self {
            rx: self.rx.resubscribe(),
            fired: self.fired.clone(),
        }
    }

    /// Resolves once shutdown fires, or when the [`Shutdown`] is dropped
    /// without firing.
    pub async fn wait(&mut self) {
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.rx.recv().await;
    }
}
