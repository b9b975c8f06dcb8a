//! Process-wide shutdown requests.
//!
//! [`channel`] returns a cloneable [`ShutdownHandle`] for the router and a
//! single [`ShutdownListener`] for the server:
//!
//! ```rust,ignore
//! let (shutdown, listener) = shutdown::channel();
//! let app = Router::new(shutdown, vec![middleware::logger()]);
//! Server::new(ServerConfig::from_env()).serve(app, listener).await?;
//! ```
//!
//! Triggering never blocks. Any number of request tasks may trigger at once;
//! the listener wakes at least once.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Creates a connected handle / listener pair.
pub fn channel() -> (ShutdownHandle, ShutdownListener) {
    let (tx, rx) = mpsc::channel(1);
    (ShutdownHandle { tx }, ShutdownListener { rx })
}

/// Requests graceful termination.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<()>,
}

impl ShutdownHandle {
    /// Sends the request without waiting.
    ///
    /// Returns `true` when a request is pending afterwards, including when
    /// another task got there first. Returns `false` only if the listener is
    /// gone.
    pub fn trigger(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => {
                warn!("shutdown requested but no listener is running");
                false
            }
        }
    }
}

/// The receiving end, owned by the server loop.
#[derive(Debug)]
pub struct ShutdownListener {
    rx: mpsc::Receiver<()>,
}

impl ShutdownListener {
    /// Resolves when shutdown is requested.
    ///
    /// If every handle is dropped without triggering, this never resolves.
    pub async fn recv(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    /// Non-blocking check, consuming a pending request.
    pub fn try_recv(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}
