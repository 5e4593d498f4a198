//! Cooperative cancellation for the retry loops.
//!
//! Both retry loops can wait for a long time (the page-level loop never gives
//! up on its own), so every wait goes through [`sleep_or_cancel`] and every
//! retry boundary checks [`CancelToken::is_cancelled`].

use tokio::sync::watch;
use tokio::time::{sleep, Duration};

/// Returned when a wait is interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// A clonable cancellation flag. All clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any token clone, including `self`.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Sleep for `duration` unless `token` is cancelled first.
pub async fn sleep_or_cancel(duration: Duration, token: &CancelToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        return Err(Cancelled);
    }
    tokio::select! {
        _ = sleep(duration) => Ok(()),
        _ = token.cancelled() => Err(Cancelled),
    }
}
