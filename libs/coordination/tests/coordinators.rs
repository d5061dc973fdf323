use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use config::{FetchConfig, UpdateConfig};
use coordination::{
    FetchCoordinator, Notification, NotifyKind, Resource, Store, SubmitError, UpdateCoordinator,
};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing_test::traced_test;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rec {
    id: Option<String>,
    name: String,
}

impl Rec {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }
}

impl Resource for Rec {
    type Key = String;

    fn key(&self) -> Option<&String> {
        self.id.as_ref()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("stub store failure")]
struct StubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Ok,
    Fail,
    Hang,
    Panic,
}

/// a store whose behaviour each test sets up
#[derive(Debug)]
struct StubStore {
    latency: Duration,
    record: Mutex<Option<Rec>>,
    read_mode: Mutex<Mode>,
    create_mode: Mutex<Mode>,
    write_mode: Mutex<Mode>,
    read_keys: Mutex<Vec<String>>,
    reads: AtomicUsize,
    creates: AtomicUsize,
    writes: AtomicUsize,
}

impl StubStore {
    fn new(latency: Duration) -> Self {
        Self {
            latency,
            record: Mutex::new(None),
            read_mode: Mutex::new(Mode::Ok),
            create_mode: Mutex::new(Mode::Ok),
            write_mode: Mutex::new(Mode::Ok),
            read_keys: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }
    fn with_record(self, rec: Rec) -> Self {
        *self.record.lock() = Some(rec);
        self
    }
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
    fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

async fn act(mode: Mode, latency: Duration) -> Result<(), StubError> {
    tokio::time::sleep(latency).await;
    match mode {
        Mode::Ok => Ok(()),
        Mode::Fail => Err(StubError),
        Mode::Hang => futures::future::pending().await,
        Mode::Panic => panic!("stub store exploded"),
    }
}

#[async_trait]
impl Store for StubStore {
    type Resource = Rec;
    type Seed = Rec;
    type Error = StubError;

    async fn read(&self, key: &String) -> Result<Option<Rec>, StubError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.read_keys.lock().push(key.clone());
        let mode = *self.read_mode.lock();
        act(mode, self.latency).await?;
        Ok(self.record.lock().clone())
    }

    async fn create(&self, seed: Rec) -> Result<Rec, StubError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mode = *self.create_mode.lock();
        act(mode, self.latency).await?;
        *self.record.lock() = Some(seed.clone());
        Ok(seed)
    }

    async fn write(&self, resource: &Rec) -> Result<(), StubError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mode = *self.write_mode.lock();
        act(mode, self.latency).await?;
        *self.record.lock() = Some(resource.clone());
        Ok(())
    }
}

fn fetcher(store: &Arc<StubStore>) -> FetchCoordinator<StubStore> {
    FetchCoordinator::new(Arc::clone(store), FetchConfig::default())
}

type Seen = Arc<Mutex<Vec<Notification>>>;

fn updater(store: &Arc<StubStore>) -> (UpdateCoordinator<StubStore>, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let seen = Arc::clone(&seen);
        move |n: Notification| seen.lock().push(n)
    };
    let coord = UpdateCoordinator::new(
        Arc::clone(store),
        Arc::new(sink),
        UpdateConfig::new(Duration::from_secs(10)),
    );
    (coord, seen)
}

// ---------------------------------------------------------------------------
// fetch
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
#[traced_test]
async fn same_key_fetches_share_one_read() {
    let store = Arc::new(StubStore::new(Duration::from_millis(50)).with_record(Rec::new("k1", "A")));
    let coord = fetcher(&store);

    let (a, b, c) = tokio::join!(
        coord.fetch("k1".into(), None),
        coord.fetch("k1".into(), None),
        coord.fetch("k1".into(), None),
    );
    assert_eq!(a, Some(Rec::new("k1", "A")));
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(store.reads(), 1);
    assert!(!coord.is_fetching());
}

#[tokio::test(start_paused = true)]
async fn other_key_is_skipped_not_queued() {
    let store = Arc::new(StubStore::new(Duration::from_millis(50)).with_record(Rec::new("k1", "A")));
    let coord = fetcher(&store);

    let (first, second) = tokio::join!(
        coord.fetch("k1".into(), None),
        coord.fetch("k2".into(), None),
    );
    assert!(first.is_some());
    assert_eq!(second, None);
    assert_eq!(*store.read_keys.lock(), vec!["k1".to_string()]);

    // once settled, the other key goes through
    coord.fetch("k2".into(), None).await;
    assert_eq!(store.reads(), 2);
    assert_eq!(coord.last_key().as_deref(), Some("k2"));
}

#[tokio::test(start_paused = true)]
async fn missing_record_created_from_seed_once() {
    let store = Arc::new(StubStore::new(Duration::from_millis(50)));
    let coord = fetcher(&store);
    let seed = Rec::new("parent-42", "Seed");

    let (a, b) = tokio::join!(
        coord.fetch("parent-42".into(), Some(seed.clone())),
        coord.fetch("parent-42".into(), Some(seed.clone())),
    );
    assert_eq!(a, Some(seed.clone()));
    assert_eq!(b, Some(seed));
    assert_eq!(store.reads(), 1);
    assert_eq!(store.creates(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_record_without_seed_is_none() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    let coord = fetcher(&store);
    assert_eq!(coord.fetch("k1".into(), None).await, None);
    assert_eq!(store.creates(), 0);
}

#[tokio::test(start_paused = true)]
async fn create_missing_off_skips_create() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    let coord = FetchCoordinator::new(Arc::clone(&store), FetchConfig::new(false));
    let res = coord
        .fetch("k1".into(), Some(Rec::new("k1", "Seed")))
        .await;
    assert_eq!(res, None);
    assert_eq!(store.creates(), 0);
}

#[tokio::test(start_paused = true)]
async fn read_error_is_none_and_cleans_up() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)).with_record(Rec::new("k1", "A")));
    *store.read_mode.lock() = Mode::Fail;
    let coord = fetcher(&store);

    assert_eq!(coord.fetch("k1".into(), Some(Rec::new("k1", "Seed"))).await, None);
    // a failed read never falls through to create
    assert_eq!(store.creates(), 0);
    assert!(!coord.is_fetching());

    *store.read_mode.lock() = Mode::Ok;
    assert!(coord.fetch("k1".into(), None).await.is_some());
    assert_eq!(store.reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn create_error_is_none_and_cleans_up() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    *store.create_mode.lock() = Mode::Fail;
    let coord = fetcher(&store);
    let seed = Rec::new("k1", "Seed");

    assert_eq!(coord.fetch("k1".into(), Some(seed.clone())).await, None);
    assert_eq!(store.creates(), 1);
    assert!(!coord.is_fetching());

    *store.create_mode.lock() = Mode::Ok;
    assert_eq!(coord.fetch("k1".into(), Some(seed.clone())).await, Some(seed));
    assert_eq!(store.reads(), 2);
    assert_eq!(store.creates(), 2);
}

#[test]
fn fetch_on_shut_down_runtime_returns_none() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let handle = rt.handle().clone();
    drop(rt);
    // spawning onto a runtime that's gone drops the task in place
    let _ctx = handle.enter();

    let store = Arc::new(StubStore::new(Duration::ZERO).with_record(Rec::new("k1", "A")));
    let coord = fetcher(&store);
    let res = futures::executor::block_on(coord.fetch("k1".into(), None));
    assert_eq!(res, None);
    assert!(!coord.is_fetching());
    assert_eq!(store.reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn panicking_read_is_none_and_cleans_up() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    *store.read_mode.lock() = Mode::Panic;
    let coord = fetcher(&store);

    assert_eq!(coord.fetch("k1".into(), None).await, None);
    assert!(!coord.is_fetching());
}

#[tokio::test(start_paused = true)]
async fn abandoned_fetch_still_settles() {
    let store = Arc::new(StubStore::new(Duration::from_millis(50)).with_record(Rec::new("k1", "A")));
    let coord = fetcher(&store);

    // the only caller gives up before the read settles
    let res = tokio::time::timeout(Duration::from_millis(10), coord.fetch("k1".into(), None)).await;
    assert!(res.is_err());
    assert!(coord.is_fetching());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!coord.is_fetching());
    assert_eq!(store.reads(), 1);
}

// ---------------------------------------------------------------------------
// update
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
#[traced_test]
async fn second_submit_rejected_while_first_in_flight() {
    let store = Arc::new(StubStore::new(Duration::from_millis(50)));
    let (coord, seen) = updater(&store);
    let rec = Rec::new("k1", "A");

    let (first, second) = tokio::join!(coord.submit(rec.clone()), coord.submit(rec));
    assert_eq!(first, Ok(()));
    assert_eq!(second, Err(SubmitError::LockRejected));
    assert_eq!(store.writes(), 1);

    // only the save is reported, the rejection is silent
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, NotifyKind::Success);
    assert_eq!(seen[0].title, "Success");
}

#[tokio::test(start_paused = true)]
async fn lock_released_after_success() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    let (coord, _seen) = updater(&store);

    assert_eq!(coord.submit(Rec::new("k1", "A")).await, Ok(()));
    assert!(!coord.is_submitting());
    assert_eq!(coord.submit(Rec::new("k1", "B")).await, Ok(()));
    assert_eq!(store.writes(), 2);
    assert_eq!(*store.record.lock(), Some(Rec::new("k1", "B")));
}

#[tokio::test(start_paused = true)]
async fn lock_released_after_failure() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    *store.write_mode.lock() = Mode::Fail;
    let (coord, seen) = updater(&store);

    let err = coord.submit(Rec::new("k1", "A")).await.unwrap_err();
    assert!(matches!(err, SubmitError::TransportFailed(_)));
    assert!(!coord.is_submitting());
    assert_eq!(seen.lock()[0].kind, NotifyKind::Error);

    *store.write_mode.lock() = Mode::Ok;
    assert_eq!(coord.submit(Rec::new("k1", "A")).await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn lock_released_after_panic() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    *store.write_mode.lock() = Mode::Panic;
    let (coord, seen) = updater(&store);

    let err = coord.submit(Rec::new("k1", "A")).await.unwrap_err();
    assert!(matches!(err, SubmitError::TransportFailed(_)));
    assert!(!coord.is_submitting());
    assert_eq!(seen.lock().len(), 1);

    *store.write_mode.lock() = Mode::Ok;
    assert_eq!(coord.submit(Rec::new("k1", "A")).await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn hung_write_released_by_safety_timer() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    *store.write_mode.lock() = Mode::Hang;
    let (coord, seen) = updater(&store);

    let start = Instant::now();
    let res = coord.submit(Rec::new("k1", "A")).await;
    assert_eq!(res, Err(SubmitError::TimeoutReleased));
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert!(!coord.is_submitting());
    // not reported to the user
    assert!(seen.lock().is_empty());

    *store.write_mode.lock() = Mode::Ok;
    assert_eq!(coord.submit(Rec::new("k1", "A")).await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn safety_timer_releases_without_a_waiting_caller() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    *store.write_mode.lock() = Mode::Hang;
    let (coord, _seen) = updater(&store);

    let bg = coord.clone();
    let task = tokio::spawn(async move { bg.submit(Rec::new("k1", "A")).await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(coord.is_submitting());
    assert_eq!(
        coord.submit(Rec::new("k1", "B")).await,
        Err(SubmitError::LockRejected)
    );

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(!coord.is_submitting());
    assert_eq!(task.await.unwrap(), Err(SubmitError::TimeoutReleased));
}

#[tokio::test(start_paused = true)]
async fn dropped_submit_releases_lock() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    *store.write_mode.lock() = Mode::Hang;
    let (coord, _seen) = updater(&store);

    let res = tokio::time::timeout(Duration::from_secs(1), coord.submit(Rec::new("k1", "A"))).await;
    assert!(res.is_err());
    assert!(!coord.is_submitting());
}

#[tokio::test(start_paused = true)]
async fn record_without_key_never_written() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    let (coord, seen) = updater(&store);

    let res = coord
        .submit(Rec {
            id: None,
            name: "A".into(),
        })
        .await;
    assert_eq!(res, Err(SubmitError::ValidationFailed));
    assert_eq!(store.writes(), 0);
    assert!(!coord.is_submitting());

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, NotifyKind::Error);
    assert_eq!(seen[0].message, UpdateConfig::default().invalid().message);
}

#[tokio::test(start_paused = true)]
async fn suppression_blocks_until_released() {
    let store = Arc::new(StubStore::new(Duration::from_millis(5)));
    let (coord, seen) = updater(&store);

    let suppression = coord.suppress();
    assert!(coord.is_suppressed());
    assert_eq!(
        coord.submit(Rec::new("k1", "A")).await,
        Err(SubmitError::LockRejected)
    );
    assert_eq!(store.writes(), 0);
    assert!(seen.lock().is_empty());

    suppression.release();
    assert!(!coord.is_suppressed());
    assert_eq!(coord.submit(Rec::new("k1", "A")).await, Ok(()));

    // dropping the handle, or releasing on the coordinator, also clears it
    {
        let _held = coord.suppress();
        assert!(coord.is_suppressed());
    }
    assert!(!coord.is_suppressed());

    let held = coord.suppress();
    coord.release();
    assert!(!coord.is_suppressed());
    drop(held);
}
