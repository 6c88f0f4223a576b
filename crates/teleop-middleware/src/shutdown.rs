//! Cooperative shutdown flag shared by the spin loop, the key reader, the
//! signal handler thread and the rosbridge forwarder.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable, thread-safe shutdown intent.
///
/// Requesting shutdown is idempotent and never blocks, so it can be called
/// from a signal-handler thread as well as from inside a tick.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Ask every holder of this signal to stop.
    pub fn request(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once shutdown has been requested (immediately if it already
    /// was).
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
