//! Programmatic shutdown for [`HttpServer`](crate::http::HttpServer).
//!
//! A `Shutdown` is a latch shared between the server and whoever wants to
//! stop it. Triggering is sticky: a server that only starts serving after
//! the trigger stops right away.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared stop latch. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Ask every server holding this latch to stop accepting connections.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once [`trigger`](Self::trigger) has been called on any clone.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
