//! Collection window timer.
//!
//! Each successful session start arms exactly one timer task. The task sleeps
//! for the window, closes the session, and hands the snapshot to whoever holds
//! the [`PendingSnapshot`]. Nothing holds the session lock while waiting.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, Instrument};

use crate::session::{SessionCoordinator, Snapshot};

/// The timer task ended without delivering a snapshot.
#[derive(Debug, Error)]
#[error("collection window ended without producing a snapshot")]
pub struct WindowClosed;

/// Handle to the snapshot of a window that is still running.
#[derive(Debug)]
pub struct PendingSnapshot {
    rx: oneshot::Receiver<Snapshot>,
}

impl PendingSnapshot {
    /// Suspend until the window closes.
    pub async fn wait(self) -> Result<Snapshot, WindowClosed> {
        self.rx.await.map_err(|_| WindowClosed)
    }
}

/// Schedule the end of the current session `duration` from now.
///
/// Must be called from within a tokio runtime, once per successful
/// `start_session`.
pub(crate) fn arm(coordinator: Arc<SessionCoordinator>, duration: Duration) -> PendingSnapshot {
    let (tx, rx) = oneshot::channel();
    let span = tracing::info_span!("collection_window", window_ms = duration.as_millis() as u64);

    tokio::spawn(
        async move {
            tokio::time::sleep(duration).await;
            let snapshot = coordinator.end_session();
            if let Err(unclaimed) = tx.send(snapshot) {
                debug!(
                    instruments = unclaimed.len(),
                    "Snapshot discarded, requester went away"
                );
            }
        }
        .instrument(span),
    );

    PendingSnapshot { rx }
}
