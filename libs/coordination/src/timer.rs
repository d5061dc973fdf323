//! safety timer for held submission locks
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A spawned task that runs `on_fire` once `window` elapses, unless it's
/// cancelled first. Cancelling is idempotent and also happens on drop.
#[derive(Debug)]
pub(crate) struct SafetyTimer {
    token: CancellationToken,
}

impl SafetyTimer {
    /// Arm a new timer. The returned future resolves after `on_fire` has run
    /// and never resolves if the timer is cancelled.
    pub(crate) fn arm<F>(window: Duration, on_fire: F) -> (Self, BoxFuture<'static, ()>)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    trace!("safety timer cancelled");
                }
                _ = tokio::time::sleep(window) => {
                    on_fire();
                    // submitter may have moved on already
                    let _ = tx.send(());
                }
            }
        });
        let expired = async move {
            if rx.await.is_err() {
                future::pending::<()>().await;
            }
        }
        .boxed();
        (Self { token }, expired)
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    #[cfg(test)]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for SafetyTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
