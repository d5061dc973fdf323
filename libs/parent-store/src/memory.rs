use std::collections::BTreeMap;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use coordination::{Resource, Store};
use parking_lot::Mutex;
use tracing::debug;

use crate::{ParentId, ParentInfo, ParentSeed, StoreError};

/// Parent records kept in process memory. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<BTreeMap<ParentId, ParentInfo>>>,
    calls: Arc<CallCounts>,
    latency: Option<Duration>,
}

/// how many times each store operation has been called
#[derive(Debug, Default)]
pub struct CallCounts {
    reads: AtomicUsize,
    creates: AtomicUsize,
    writes: AtomicUsize,
}

impl CallCounts {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// every operation sleeps for `latency` first, like a round trip would
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    pub fn get(&self, id: &ParentId) -> Option<ParentInfo> {
        self.inner.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn round_trip(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Resource = ParentInfo;
    type Seed = ParentSeed;
    type Error = StoreError;

    async fn read(&self, key: &ParentId) -> Result<Option<ParentInfo>, Self::Error> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        Ok(self.get(key))
    }

    async fn create(&self, seed: ParentSeed) -> Result<ParentInfo, Self::Error> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        let mut guard = self.inner.lock();
        // creating twice hands back the first record
        let info = guard
            .entry(seed.id.clone())
            .or_insert_with(|| {
                debug!(id = %seed.id, "inserting parent record");
                ParentInfo::from(seed)
            })
            .clone();
        Ok(info)
    }

    async fn write(&self, resource: &ParentInfo) -> Result<(), Self::Error> {
        self.calls.writes.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        let id = resource.key().ok_or(StoreError::MissingId)?.clone();
        self.inner.lock().insert(id, resource.clone());
        Ok(())
    }
}
