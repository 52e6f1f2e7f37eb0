use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::CacheError;
use crate::api::Upstream;
use crate::diff::created_entities;
use crate::events::{ClassificationBatch, NetworkEvent, EVENT_CHANNEL_CAPACITY};
use crate::models::{stamp_of, Snapshot, UPDATED_AT_FIELD};

/// Consider the snapshot stale after 60 seconds.
/// The upstream feed itself regenerates roughly every 15 seconds, so a
/// minute keeps traffic low without serving noticeably old positions.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 60;

/// Current snapshot file name in the data directory
const CURRENT_FILE: &str = "vatsim-data.json";

/// Previous snapshot (diff baseline) file name in the data directory
const PREVIOUS_FILE: &str = "vatsim-data.previous.json";

type RefreshResult = Result<Arc<Snapshot>, CacheError>;
type Flight = Shared<BoxFuture<'static, RefreshResult>>;

/// Single-flight bookkeeping. `generation` counts completed refreshes.
#[derive(Default)]
struct FlightState {
    generation: u64,
    in_flight: Option<Flight>,
    last: Option<RefreshResult>,
}

struct Inner<U> {
    upstream: U,
    current_path: PathBuf,
    previous_path: PathBuf,
    stale_after: chrono::Duration,
    events: broadcast::Sender<NetworkEvent>,
    flight: Mutex<FlightState>,
}

/// On-disk cache of the network snapshot plus the previous one.
///
/// Clone is cheap and every clone shares the same files, event channel and
/// refresh gate.
pub struct SnapshotStore<U> {
    inner: Arc<Inner<U>>,
}

impl<U> Clone for SnapshotStore<U> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<U: Upstream> SnapshotStore<U> {
    pub fn new(upstream: U, data_dir: PathBuf, stale_after: Duration) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&data_dir).map_err(|e| CacheError::storage(&data_dir, e))?;

        // Clamp absurd thresholds so the conversion cannot fail
        let capped = stale_after.min(Duration::from_secs(u64::from(u32::MAX)));
        let stale_after = chrono::Duration::from_std(capped)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                upstream,
                current_path: data_dir.join(CURRENT_FILE),
                previous_path: data_dir.join(PREVIOUS_FILE),
                stale_after,
                events,
                flight: Mutex::new(FlightState::default()),
            }),
        })
    }

    pub fn current_path(&self) -> &Path {
        &self.inner.current_path
    }

    pub fn previous_path(&self) -> &Path {
        &self.inner.previous_path
    }

    pub fn stale_after(&self) -> chrono::Duration {
        self.inner.stale_after
    }

    /// Listen for new-connection events from refreshes of this store.
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.inner.events.subscribe()
    }

    /// The cached snapshot as it is on disk, without any staleness check.
    pub async fn current(&self) -> Result<Option<Arc<Snapshot>>, CacheError> {
        self.inner.read_current().await
    }

    /// True if there is no usable snapshot or it is older than the
    /// staleness threshold.
    pub async fn is_stale(&self) -> bool {
        match self.inner.read_current().await {
            Ok(Some(snapshot)) => snapshot.is_stale_at(Utc::now(), self.inner.stale_after),
            Ok(None) => true, // No cache = stale
            Err(e) => {
                debug!(error = %e, "Failed to load snapshot for staleness check");
                true // Error reading = treat as stale
            }
        }
    }

    /// Return a snapshot that is fresh as of now, refreshing first when
    /// the cached one is missing, stale or unreadable.
    ///
    /// A failed refresh is returned as an error; stale data is never served
    /// from here. Use [`SnapshotStore::current`] for last-known-good reads.
    pub async fn load(&self) -> Result<Arc<Snapshot>, CacheError> {
        let seen = self.inner.lock_flight().generation;

        match self.inner.read_current().await {
            Ok(Some(snapshot)) if !snapshot.is_stale_at(Utc::now(), self.inner.stale_after) => {
                debug!(updated_at = %snapshot.updated_at, "Serving cached snapshot");
                return Ok(snapshot);
            }
            Ok(Some(snapshot)) => {
                debug!(updated_at = %snapshot.updated_at, "Cached snapshot is stale");
            }
            Ok(None) => info!("No cached snapshot, performing initial fetch"),
            Err(e) => warn!(error = %e, "Cached snapshot unreadable, refreshing"),
        }

        self.join_or_start(Some(seen)).await
    }

    /// Fetch a new snapshot unconditionally. Joins a refresh that is
    /// already in progress instead of starting another.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, CacheError> {
        self.join_or_start(None).await
    }

    /// `seen` is the refresh generation the caller observed before deciding
    /// to refresh. If a refresh has completed since then, its outcome is
    /// reused instead of fetching again.
    async fn join_or_start(&self, seen: Option<u64>) -> RefreshResult {
        let flight = {
            let mut state = self.inner.lock_flight();
            match state.in_flight.clone() {
                Some(flight) => {
                    debug!("Joining in-flight refresh");
                    flight
                }
                None => {
                    let finished_since = seen.is_some_and(|seen| seen != state.generation);
                    if let (true, Some(last)) = (finished_since, state.last.clone()) {
                        debug!("Refresh completed while checking staleness, reusing result");
                        return last;
                    }
                    self.start_flight(&mut state)
                }
            }
        };
        flight.await
    }

    fn start_flight(&self, state: &mut FlightState) -> Flight {
        let task_inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let result = task_inner.run_refresh().await;
            let mut state = task_inner.lock_flight();
            state.generation += 1;
            state.last = Some(result.clone());
            state.in_flight = None;
            result
        });

        let join_inner = Arc::clone(&self.inner);
        let flight = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    // The task never reached its bookkeeping; release the gate here.
                    let err = CacheError::Task(e.to_string());
                    let mut state = join_inner.lock_flight();
                    state.generation += 1;
                    state.last = Some(Err(err.clone()));
                    state.in_flight = None;
                    Err(err)
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(flight.clone());
        flight
    }
}

impl<U: Upstream> Inner<U> {
    fn lock_flight(&self) -> MutexGuard<'_, FlightState> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn read_current(&self) -> Result<Option<Arc<Snapshot>>, CacheError> {
        let bytes = match tokio::fs::read(&self.current_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::storage(&self.current_path, e)),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::corrupt(&self.current_path, e))?;
        Ok(Some(Arc::new(snapshot)))
    }

    /// Copy the current snapshot over the previous one and return it as the
    /// diff baseline. `None` when there is nothing to compare against.
    async fn back_up_current(&self) -> Result<Option<Value>, CacheError> {
        let bytes = match tokio::fs::read(&self.current_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::storage(&self.current_path, e)),
        };

        write_atomic(&self.previous_path, &bytes).await?;

        match serde_json::from_slice(&bytes) {
            Ok(baseline) => Ok(Some(baseline)),
            Err(e) => {
                warn!(error = %e, "Previous snapshot is corrupt, skipping diff");
                Ok(None)
            }
        }
    }

    async fn run_refresh(&self) -> RefreshResult {
        info!("Refreshing network snapshot");

        let baseline = self.back_up_current().await?;
        let mut document = self.upstream.fetch_one().await?;

        // Never move the stamp backwards, even if the wall clock does
        let now = Utc::now();
        let updated_at = baseline
            .as_ref()
            .and_then(stamp_of)
            .map_or(now, |previous| previous.max(now));
        // Any JSON object is accepted; malformed entries are dropped while decoding
        let Some(map) = document.as_object_mut() else {
            return Err(CacheError::Decode(Arc::new(serde::de::Error::custom(
                "expected a JSON object at the top level",
            ))));
        };
        let stamp = serde_json::to_value(updated_at).map_err(|e| CacheError::Encode(e.into()))?;
        map.insert(UPDATED_AT_FIELD.to_string(), stamp);

        let snapshot =
            Snapshot::deserialize(&document).map_err(|e| CacheError::Decode(e.into()))?;
        let bytes = serde_json::to_vec(&document).map_err(|e| CacheError::Encode(e.into()))?;
        write_atomic(&self.current_path, &bytes).await?;

        info!(
            pilots = snapshot.pilots.len(),
            controllers = snapshot.controllers.len(),
            updated_at = %snapshot.updated_at,
            "Snapshot refreshed"
        );

        match baseline {
            Some(baseline) => self.emit_new_clients(&baseline, &document),
            None => debug!("No baseline snapshot, skipping diff"),
        }

        Ok(Arc::new(snapshot))
    }

    fn emit_new_clients(&self, baseline: &Value, current: &Value) {
        let mut created = created_entities(clients(baseline, "pilots"), clients(current, "pilots"));
        created.extend(created_entities(
            clients(baseline, "controllers"),
            clients(current, "controllers"),
        ));

        let batch = ClassificationBatch::partition(created);
        if batch.is_empty() {
            debug!("No new clients since previous snapshot");
            return;
        }

        info!(
            pilots = batch.pilots.len(),
            controllers = batch.controllers.len(),
            "New clients connected"
        );
        for event in batch.into_events() {
            if self.events.send(event).is_err() {
                debug!("No event listeners registered");
            }
        }
    }
}

fn clients<'a>(document: &'a Value, key: &str) -> &'a [Value] {
    document
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Write to a sibling temp file, then rename over the target so readers
/// never observe a partial file.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CacheError::storage(&tmp, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CacheError::storage(path, e));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    use crate::api::ApiError;

    /// Upstream that replays queued responses and counts fetches.
    struct ScriptedUpstream {
        responses: Mutex<VecDeque<Result<Value, ApiError>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedUpstream {
        fn new(responses: Vec<Result<Value, ApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl Upstream for Arc<ScriptedUpstream> {
        fn fetch_one(&self) -> impl Future<Output = Result<Value, ApiError>> + Send {
            let this = Arc::clone(self);
            async move {
                this.calls.fetch_add(1, Ordering::SeqCst);
                if !this.delay.is_zero() {
                    tokio::time::sleep(this.delay).await;
                }
                let next = this.responses.lock().unwrap().pop_front();
                next.unwrap_or_else(|| Ok(feed(&[], &[])))
            }
        }
    }

    fn feed(pilots: &[&str], controllers: &[&str]) -> Value {
        let pilots: Vec<Value> = pilots
            .iter()
            .enumerate()
            .map(|(i, cs)| json!({"cid": 100 + i, "callsign": cs, "altitude": 1000 * i}))
            .collect();
        let controllers: Vec<Value> = controllers
            .iter()
            .enumerate()
            .map(|(i, cs)| json!({"cid": 200 + i, "callsign": cs, "frequency": "118.500", "facility": 4}))
            .collect();
        json!({
            "general": {"unique_users": pilots.len() + controllers.len()},
            "pilots": pilots,
            "controllers": controllers
        })
    }

    fn unavailable() -> ApiError {
        ApiError::UpstreamStatus {
            url: "http://mirror/data.json".into(),
            status: 503,
            body: "maintenance".into(),
        }
    }

    fn store_with(
        dir: &Path,
        upstream: &Arc<ScriptedUpstream>,
    ) -> SnapshotStore<Arc<ScriptedUpstream>> {
        SnapshotStore::new(
            Arc::clone(upstream),
            dir.to_path_buf(),
            Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
        )
        .unwrap()
    }

    /// Seed the current snapshot file with a stamp `age_secs` in the past.
    fn seed(store: &SnapshotStore<Arc<ScriptedUpstream>>, mut doc: Value, age_secs: i64) {
        let stamp = Utc::now() - chrono::Duration::seconds(age_secs);
        doc[UPDATED_AT_FIELD] = json!(stamp);
        std::fs::write(store.current_path(), serde_json::to_vec(&doc).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_initial_load_fetches_without_events() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![Ok(feed(&["BAW1"], &["EGLL_TWR"]))]));
        let store = store_with(dir.path(), &upstream);
        let mut rx = store.subscribe();

        assert!(store.is_stale().await);
        let snapshot = store.load().await.unwrap();

        assert_eq!(snapshot.pilots.len(), 1);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert!(store.current_path().exists());
        assert!(!store.previous_path().exists());
        assert!(!store.is_stale().await);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_second_load_within_window_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![Ok(feed(&["BAW1"], &[]))]));
        let store = store_with(dir.path(), &upstream);

        let first = store.load().await.unwrap();
        let second = store.load().await.unwrap();

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*first, *second);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![Ok(feed(&["NEW1"], &[]))]));
        let store = store_with(dir.path(), &upstream);
        seed(&store, feed(&["OLD1"], &[]), 120);

        assert!(store.is_stale().await);
        let snapshot = store.load().await.unwrap();

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot.pilots[0].callsign, "NEW1");
        let previous: Value =
            serde_json::from_slice(&std::fs::read(store.previous_path()).unwrap()).unwrap();
        assert_eq!(previous["pilots"][0]["callsign"], "OLD1");
    }

    #[tokio::test]
    async fn test_fresh_seed_is_not_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![]));
        let store = store_with(dir.path(), &upstream);
        seed(&store, feed(&["OLD1"], &[]), 5);

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.pilots[0].callsign, "OLD1");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_emits_partitioned_events_once() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![Ok(feed(
            &["P1", "P2"],
            &["A", "B"],
        ))]));
        let store = store_with(dir.path(), &upstream);
        seed(&store, feed(&["P1"], &["A"]), 120);
        let mut rx = store.subscribe();

        store.refresh().await.unwrap();

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        match first {
            NetworkEvent::NewControllers(controllers) => {
                assert_eq!(controllers.len(), 1);
                assert_eq!(controllers[0].callsign, "B");
            }
            other => panic!("expected controllers first, got {:?}", other),
        }
        match second {
            NetworkEvent::NewPilots(pilots) => {
                assert_eq!(pilots.len(), 1);
                assert_eq!(pilots[0].callsign, "P2");
            }
            other => panic!("expected pilots second, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_without_changes_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![Ok(feed(&["P1"], &["A"]))]));
        let store = store_with(dir.path(), &upstream);
        seed(&store, feed(&["P1"], &["A"]), 120);
        let mut rx = store.subscribe();

        store.refresh().await.unwrap();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![Err(unavailable())]));
        let store = store_with(dir.path(), &upstream);
        seed(&store, feed(&["P1"], &["A"]), 120);
        let before = std::fs::read(store.current_path()).unwrap();
        let mut rx = store.subscribe();

        let err = store.load().await.unwrap_err();

        assert!(err.is_fetch());
        assert!(matches!(err, CacheError::Fetch(ref api) if api.status() == Some(503)));
        assert_eq!(std::fs::read(store.current_path()).unwrap(), before);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_non_object_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![Ok(json!(["not", "a", "feed"]))]));
        let store = store_with(dir.path(), &upstream);

        let err = store.refresh().await.unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
        assert!(!store.current_path().exists());
    }

    #[tokio::test]
    async fn test_off_type_entry_does_not_block_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = feed(&["P1"], &["A"]);
        doc["pilots"]
            .as_array_mut()
            .unwrap()
            .push(json!({"cid": 7, "callsign": "ODD1", "altitude": 3500.5}));
        let upstream = Arc::new(ScriptedUpstream::new(vec![Ok(doc)]));
        let store = store_with(dir.path(), &upstream);

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.pilots.len(), 1);
        assert_eq!(snapshot.controllers.len(), 1);

        // Raw entry is persisted as fetched and the cache serves later loads
        let on_disk: Value =
            serde_json::from_slice(&std::fs::read(store.current_path()).unwrap()).unwrap();
        assert_eq!(on_disk["pilots"][1]["callsign"], "ODD1");
        let again = store.load().await.unwrap();
        assert_eq!(again.pilots[0].callsign, "P1");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![Ok(feed(&["P1"], &[]))]));
        let store = store_with(dir.path(), &upstream);
        std::fs::write(store.current_path(), b"{ not json").unwrap();
        let mut rx = store.subscribe();

        assert!(matches!(store.current().await, Err(CacheError::Corrupt { .. })));
        assert!(store.is_stale().await);

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.pilots.len(), 1);
        // A corrupt baseline cannot be diffed
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_updated_at_never_moves_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![Ok(feed(&[], &[]))]));
        let store = store_with(dir.path(), &upstream);
        // Stamp from a clock that ran ahead
        seed(&store, feed(&[], &[]), -3600);
        let future_stamp = store.current().await.unwrap().unwrap().updated_at;

        let snapshot = store.refresh().await.unwrap();
        assert_eq!(snapshot.updated_at, future_stamp);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(
            ScriptedUpstream::new(vec![Ok(feed(&["P1"], &[]))]).with_delay(Duration::from_millis(100)),
        );
        let store = store_with(dir.path(), &upstream);

        let loads = (0..16).map(|_| {
            let store = store.clone();
            async move { store.load().await }
        });
        let results = futures::future::join_all(loads).await;

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(result.as_ref().unwrap(), first));
        }
    }

    #[tokio::test]
    async fn test_load_joins_overlapping_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(
            ScriptedUpstream::new(vec![Ok(feed(&["P1"], &[]))]).with_delay(Duration::from_millis(100)),
        );
        let store = store_with(dir.path(), &upstream);

        let (refreshed, loaded) = tokio::join!(store.refresh(), store.load());

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&refreshed.unwrap(), &loaded.unwrap()));
    }

    #[tokio::test]
    async fn test_refresh_finished_since_check_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![
            Ok(feed(&["P1"], &[])),
            Ok(feed(&["P2"], &[])),
        ]));
        let store = store_with(dir.path(), &upstream);

        // Generation observed before the staleness check
        let seen = store.inner.lock_flight().generation;
        let refreshed = store.refresh().await.unwrap();

        let reused = store.join_or_start(Some(seen)).await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&refreshed, &reused));

        // An up-to-date generation starts a new fetch
        let current = store.inner.lock_flight().generation;
        let fetched = store.join_or_start(Some(current)).await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetched.pilots[0].callsign, "P2");
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_shared() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(
            ScriptedUpstream::new(vec![Err(unavailable())]).with_delay(Duration::from_millis(50)),
        );
        let store = store_with(dir.path(), &upstream);

        let (a, b) = tokio::join!(store.refresh(), store.refresh());

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert!(a.unwrap_err().is_fetch());
        assert!(b.unwrap_err().is_fetch());
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = Arc::new(ScriptedUpstream::new(vec![
            Ok(feed(&["P1"], &[])),
            Ok(feed(&["P1", "P2"], &[])),
        ]));
        let store = store_with(dir.path(), &upstream);
        let mut rx = store.subscribe();

        store.refresh().await.unwrap();
        let second = store.refresh().await.unwrap();

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.pilots.len(), 2);
        assert!(matches!(rx.try_recv(), Ok(NetworkEvent::NewPilots(p)) if p[0].callsign == "P2"));
    }
}
