//! De-duplicated reads.
//!
//! One read is outstanding at a time. The store call runs in its own task so
//! it settles, and the in-flight slot gets cleared, even if every caller
//! stops waiting on it.

use std::sync::Arc;

use config::FetchConfig;
use futures::future::{BoxFuture, FutureExt, Shared};
use hearth_core::metrics;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, debug_span, error};
use tracing_futures::Instrument;

use crate::store::{Key, Store};

type SharedFetch<R> = Shared<BoxFuture<'static, Option<R>>>;

struct FetchState<K, R> {
    /// key of the most recent read that was started
    last_key: Option<K>,
    /// `Some` exactly while a read for `last_key` is outstanding
    in_flight: Option<SharedFetch<R>>,
    generation: u64,
}

/// Shares one in-flight read between every caller asking for the same key.
///
/// Clones share state, so a clone is a second handle onto the same
/// coordinator, not a new one.
pub struct FetchCoordinator<S: Store> {
    store: Arc<S>,
    cfg: FetchConfig,
    state: Arc<Mutex<FetchState<Key<S>, S::Resource>>>,
}

impl<S: Store> Clone for FetchCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cfg: self.cfg,
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: Store> std::fmt::Debug for FetchCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FetchCoordinator")
            .field("cfg", &self.cfg)
            .field("last_key", &state.last_key)
            .field("fetching", &state.in_flight.is_some())
            .finish()
    }
}

impl<S: Store> FetchCoordinator<S> {
    pub fn new(store: Arc<S>, cfg: FetchConfig) -> Self {
        Self {
            store,
            cfg,
            state: Arc::new(Mutex::new(FetchState {
                last_key: None,
                in_flight: None,
                generation: 0,
            })),
        }
    }

    /// Fetch the record for `key`.
    ///
    /// - nothing in flight: start a read. If it finds nothing and `seed` is
    ///   given (and `create_missing` is on) the record is created from `seed`.
    /// - read for `key` already in flight: wait on that one. Its seed wins,
    ///   ours is dropped.
    /// - read for another key in flight: `None` immediately, nothing queued.
    ///
    /// Store errors are logged and come back as `None`.
    pub async fn fetch(&self, key: Key<S>, seed: Option<S::Seed>) -> Option<S::Resource> {
        let (pending, work) = {
            let mut state = self.state.lock();
            if let Some(pending) = state.in_flight.clone() {
                if state.last_key.as_ref() != Some(&key) {
                    debug!(?key, in_flight = ?state.last_key, "fetch for another key in flight, skipping");
                    metrics::FETCH_COUNT.skipped.inc();
                    return None;
                }
                debug!(?key, "joining in-flight fetch");
                metrics::FETCH_COUNT.deduplicated.inc();
                (pending, None)
            } else {
                state.generation = state.generation.wrapping_add(1);
                let (pending, work) = self.prepare(key.clone(), seed, state.generation);
                state.last_key = Some(key);
                state.in_flight = Some(pending.clone());
                (pending, Some(work))
            }
        };
        // spawned outside the state lock, the task may be dropped in place
        // (runtime shutting down) and its guard takes the lock
        if let Some(work) = work {
            tokio::spawn(work);
        }
        pending.await
    }

    /// is a read outstanding
    pub fn is_fetching(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    /// key of the most recent read started
    pub fn last_key(&self) -> Option<Key<S>> {
        self.state.lock().last_key.clone()
    }

    /// Build the read task and the shared handle callers wait on. The task
    /// is not spawned yet, the caller fills the in-flight slot first.
    fn prepare(
        &self,
        key: Key<S>,
        seed: Option<S::Seed>,
        generation: u64,
    ) -> (SharedFetch<S::Resource>, BoxFuture<'static, ()>) {
        let store = Arc::clone(&self.store);
        let guard = InFlightGuard {
            state: Arc::clone(&self.state),
            generation,
        };
        let create_missing = self.cfg.create_missing();
        metrics::FETCH_COUNT.started.inc();
        metrics::IN_FLIGHT_FETCHES.inc();

        let (tx, rx) = oneshot::channel();
        let span = debug_span!("fetch", ?key, generation);
        // the guard lives in the task so the slot is cleared on every exit,
        // including a panicking store or the task being dropped unpolled
        let work = async move {
            let res = read_or_create(&*store, &key, seed, create_missing).await;
            // slot is free before any waiter wakes
            drop(guard);
            // every waiter may have gone already
            let _ = tx.send(res);
        }
        .instrument(span)
        .boxed();

        let pending = async move {
            match rx.await {
                Ok(res) => res,
                Err(_) => {
                    error!("fetch task ended without a result");
                    metrics::FETCH_COUNT.failed.inc();
                    None
                }
            }
        }
        .boxed()
        .shared();
        (pending, work)
    }
}

async fn read_or_create<S: Store>(
    store: &S,
    key: &Key<S>,
    seed: Option<S::Seed>,
    create_missing: bool,
) -> Option<S::Resource> {
    match store.read(key).await {
        Ok(Some(found)) => {
            debug!("record found");
            Some(found)
        }
        Ok(None) => match seed {
            Some(seed) if create_missing => {
                debug!(?seed, "no record found, creating from seed");
                match store.create(seed).await {
                    Ok(created) => {
                        metrics::FETCH_COUNT.created.inc();
                        Some(created)
                    }
                    Err(err) => {
                        error!(?err, "failed to create record from seed");
                        metrics::FETCH_COUNT.failed.inc();
                        None
                    }
                }
            }
            _ => {
                debug!("no record found");
                None
            }
        },
        Err(err) => {
            error!(?err, "failed to read record");
            metrics::FETCH_COUNT.failed.inc();
            None
        }
    }
}

/// clears the in-flight slot when the read task ends, however it ends
struct InFlightGuard<K, R> {
    state: Arc<Mutex<FetchState<K, R>>>,
    generation: u64,
}

impl<K, R> Drop for InFlightGuard<K, R> {
    fn drop(&mut self) {
        metrics::IN_FLIGHT_FETCHES.dec();
        let mut state = self.state.lock();
        if state.generation == self.generation {
            state.in_flight = None;
        }
    }
}
