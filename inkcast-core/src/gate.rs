//! Readiness signal between the client reader and the streamer.
//!
//! A [`ReadyGate`] is a single boolean-style signal, not a queue:
//! however many readiness notifications arrive before a wait, one
//! wait consumes them all. The streamer clears the gate immediately
//! before each wait so a stale signal from a previous tile cannot
//! satisfy the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Collapse-to-one readiness signal.
#[derive(Debug, Default)]
pub struct ReadyGate {
    ready: AtomicBool,
    notify: Notify,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the client as ready and wake any waiter.
    pub fn signal(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Drop any pending signal.
    pub fn clear(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Whether a signal is currently pending.
    pub fn is_set(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Wait until the gate is signalled. Returns immediately if a
    /// signal is already pending. The signal is left set; callers
    /// clear it before their next wait.
    pub async fn wait(&self) {
        loop {
            // Register the waiter before checking the flag, so a
            // signal landing between the check and the await still
            // wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.ready.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Wait with a deadline. Returns `true` if the gate was signalled
    /// within `timeout`, `false` otherwise.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}

// ── Tests ────────────────────────────────────────────────────────
