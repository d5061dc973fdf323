//! Lock-serialized writes.
//!
//! A submit holds the lock from acceptance until the write settles, the
//! safety timer fires, or the submit future is dropped, whichever is first.
//! Every one of those paths goes through [`release`], which is a no-op for
//! a lock that has already been handed to a newer submission.

use std::{fmt, sync::Arc, time::Instant};

use config::UpdateConfig;
use futures::future::BoxFuture;
use hearth_core::metrics;
use parking_lot::Mutex;
use tracing::{debug, debug_span, error, info, warn};
use tracing_futures::Instrument;

use crate::{
    error::SubmitError,
    notify::{Notification, NotifyKind, Notifier},
    store::{Resource, Store},
    timer::SafetyTimer,
};

#[derive(Debug, Default)]
struct UpdateState {
    /// true exactly while a write holds the lock
    submitting: bool,
    /// set by callers through `suppress`, blocks new writes
    suppressed: bool,
    /// bumped on every accepted submission
    generation: u64,
    timer: Option<SafetyTimer>,
}

impl UpdateState {
    fn is_locked(&self) -> bool {
        self.submitting || self.suppressed
    }
}

/// Lets one write through at a time.
///
/// Clones share state, so a clone is a second handle onto the same
/// coordinator, not a new one.
pub struct UpdateCoordinator<S: Store> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    cfg: Arc<UpdateConfig>,
    state: Arc<Mutex<UpdateState>>,
}

impl<S: Store> Clone for UpdateCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            cfg: Arc::clone(&self.cfg),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: Store> fmt::Debug for UpdateCoordinator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateCoordinator")
            .field("cfg", &self.cfg)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl<S: Store> UpdateCoordinator<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, cfg: UpdateConfig) -> Self {
        Self {
            store,
            notifier,
            cfg: Arc::new(cfg),
            state: Arc::new(Mutex::new(UpdateState::default())),
        }
    }

    /// Write `resource` to the store.
    ///
    /// Rejected without touching the store while another write holds the
    /// lock or writes are suppressed (`LockRejected`), or when the record has
    /// no key (`ValidationFailed`, user notified). Otherwise the write runs
    /// under the lock and the user is told whether it saved.
    ///
    /// If the write hasn't settled once `safety_timeout` elapses the lock is
    /// released and `TimeoutReleased` returned. The write keeps running in
    /// the background and its outcome is ignored.
    pub async fn submit(&self, resource: S::Resource) -> Result<(), SubmitError> {
        let accepted = {
            let mut state = self.state.lock();
            if state.is_locked() {
                debug!(
                    submitting = state.submitting,
                    suppressed = state.suppressed,
                    "submission rejected"
                );
                metrics::SUBMIT_COUNT.rejected.inc();
                return Err(SubmitError::LockRejected);
            }
            resource.key().is_some().then(|| self.acquire(&mut state))
        };
        let Some((generation, expired)) = accepted else {
            warn!(?resource, "record has no id, refusing to submit");
            metrics::SUBMIT_COUNT.invalid.inc();
            self.notify(NotifyKind::Error, self.cfg.invalid());
            return Err(SubmitError::ValidationFailed);
        };

        let key = resource.key().cloned();
        debug!(?key, generation, "submission accepted");
        // releases the lock if this future is dropped mid-write
        let guard = LockGuard {
            state: Arc::clone(&self.state),
            generation,
        };
        let start = Instant::now();
        // spawned so a timed out write is abandoned rather than cancelled
        let store = Arc::clone(&self.store);
        let write = tokio::spawn(
            async move { store.write(&resource).await }.instrument(debug_span!("write", generation)),
        );

        tokio::select! {
            res = write => {
                drop(guard);
                let elapsed = start.elapsed().as_secs_f64();
                match res {
                    Ok(Ok(())) => {
                        info!(?key, "record saved");
                        metrics::SUBMIT_COUNT.saved.inc();
                        metrics::WRITE_DURATION.with_label_values(&["saved"]).observe(elapsed);
                        self.notify(NotifyKind::Success, self.cfg.saved());
                        Ok(())
                    }
                    Ok(Err(err)) => {
                        error!(?err, ?key, "failed to save record");
                        self.write_failed(elapsed, err.to_string())
                    }
                    Err(err) => {
                        error!(?err, ?key, "write task failed");
                        self.write_failed(elapsed, format!("write task failed: {err}"))
                    }
                }
            }
            _ = expired => {
                drop(guard);
                warn!(
                    ?key,
                    timeout = ?self.cfg.safety_timeout(),
                    "write did not settle in time, lock released"
                );
                metrics::SUBMIT_COUNT.timed_out.inc();
                Err(SubmitError::TimeoutReleased)
            }
        }
    }

    /// Block new submissions until the returned handle is released or
    /// dropped. An in-flight write is not affected.
    #[must_use = "dropping the Suppression releases it immediately"]
    pub fn suppress(&self) -> Suppression {
        self.state.lock().suppressed = true;
        debug!("submissions suppressed");
        Suppression {
            state: Arc::clone(&self.state),
        }
    }

    /// Clear the suppression flag, whoever set it
    pub fn release(&self) {
        clear_suppression(&self.state);
    }

    /// is a write holding the lock
    pub fn is_submitting(&self) -> bool {
        self.state.lock().submitting
    }

    pub fn is_suppressed(&self) -> bool {
        self.state.lock().suppressed
    }

    // caller holds the state lock
    fn acquire(&self, state: &mut UpdateState) -> (u64, BoxFuture<'static, ()>) {
        state.generation = state.generation.wrapping_add(1);
        state.submitting = true;
        let generation = state.generation;

        let timer_state = Arc::clone(&self.state);
        let (timer, expired) = SafetyTimer::arm(self.cfg.safety_timeout(), move || {
            if release(&timer_state, generation) {
                warn!(generation, "safety timeout fired, submission lock released");
            }
        });
        // replacing drops (and so cancels) any leftover timer
        state.timer = Some(timer);

        metrics::SUBMIT_COUNT.accepted.inc();
        metrics::HELD_LOCKS.inc();
        (generation, expired)
    }

    fn write_failed(&self, elapsed: f64, reason: String) -> Result<(), SubmitError> {
        metrics::SUBMIT_COUNT.failed.inc();
        metrics::WRITE_DURATION
            .with_label_values(&["failed"])
            .observe(elapsed);
        self.notify(NotifyKind::Error, self.cfg.failed());
        Err(SubmitError::TransportFailed(reason))
    }

    fn notify(&self, kind: NotifyKind, msg: &config::Message) {
        self.notifier.notify(Notification::new(kind, msg));
    }
}

/// Release the submission lock held by `generation`. Returns false if that
/// generation no longer holds it.
fn release(state: &Mutex<UpdateState>, generation: u64) -> bool {
    let mut state = state.lock();
    if state.generation != generation || !state.submitting {
        return false;
    }
    state.submitting = false;
    if let Some(timer) = state.timer.take() {
        timer.cancel();
    }
    metrics::HELD_LOCKS.dec();
    true
}

fn clear_suppression(state: &Mutex<UpdateState>) {
    let mut state = state.lock();
    if state.suppressed {
        state.suppressed = false;
        debug!("submission suppression released");
    }
}

struct LockGuard {
    state: Arc<Mutex<UpdateState>>,
    generation: u64,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        release(&self.state, self.generation);
    }
}

/// Returned by [`UpdateCoordinator::suppress`]. Submissions stay blocked
/// until this is released or dropped.
pub struct Suppression {
    state: Arc<Mutex<UpdateState>>,
}

impl Suppression {
    pub fn release(self) {
        // Drop does the work
    }
}

impl Drop for Suppression {
    fn drop(&mut self) {
        clear_suppression(&self.state);
    }
}

impl fmt::Debug for Suppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suppression").finish_non_exhaustive()
    }
}
