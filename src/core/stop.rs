// # Stop Signal
//
// Cooperative cancellation shared between a fetch loop, the provider call it
// is awaiting, and the dispatcher that owns the session.
//
// Raising the signal never aborts anything. Holders check `is_raised()`
// between steps or await `raised()` alongside other work; an in-flight fetch
// completes and its result is discarded.

use tokio::sync::watch;

/// A cloneable, one-way stop flag backed by a `watch` channel.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    /// Raise the signal. Idempotent.
    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is raised (immediately if it already is).
    pub async fn raised(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of `self`, so this only
        // errors if every holder is gone; treat that as raised.
        let _ = rx.wait_for(|raised| *raised).await;
    }
}
