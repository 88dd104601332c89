use super::*;
use crate::gateway::{BatchCallback, Subscription};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

/// Latest known documents of a query, keyed by id.
pub type WatchedMap = BTreeMap<String, Document>;

struct WatcherState {
    started: bool,
    /// Bumped on every start and stop; batches tagged with an older value are dropped.
    generation: u64,
    /// The next batch is the first one of the current subscription and carries
    /// the full result set.
    fresh: bool,
    subscription: Option<Subscription>,
    docs: WatchedMap,
}

/// Keeps a live in-memory mirror of a query's result set.
///
/// Each change batch is applied in order and the whole map is then published
/// once, so observers never see a half-applied batch. Subscription errors are
/// logged and the last good map keeps being served.
pub struct MapWatcher {
    gateway: Arc<dyn DocumentGateway>,
    query: Query,
    deferred: bool,
    state: Arc<Mutex<WatcherState>>,
    map: Observable<Arc<WatchedMap>>,
}

/// Applies `changes` in order. Returns the number of ignored records.
pub(crate) fn apply_changes(docs: &mut WatchedMap, changes: Vec<Change>, collection: &str) -> usize {
    let mut ignored = 0;
    for change in changes {
        match change.kind {
            ChangeKind::Removed => {
                docs.remove(&change.id);
            }
            ChangeKind::Added | ChangeKind::Modified => {
                let doc = Document::new(change.id.clone(), change.data.unwrap_or_default());
                docs.insert(change.id, doc);
            }
            ChangeKind::Unknown => {
                warn!("unhandled change type for {collection}/{}", change.id);
                ignored += 1;
            }
        }
    }
    ignored
}

impl MapWatcher {
    /// A deferred watcher stays idle until [`MapWatcher::start`]; any other
    /// watcher subscribes right away.
    pub fn new(gateway: Arc<dyn DocumentGateway>, query: Query, deferred: bool) -> FiresiteResult<Self> {
        let watcher = Self {
            gateway,
            query,
            deferred,
            state: Arc::new(Mutex::new(WatcherState {
                started: false,
                generation: 0,
                fresh: false,
                subscription: None,
                docs: WatchedMap::new(),
            })),
            map: Observable::new(Arc::default()),
        };
        if !deferred {
            watcher.start()?;
        }
        Ok(watcher)
    }

    fn lock(&self) -> MutexGuard<'_, WatcherState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn current(&self) -> Arc<WatchedMap> {
        self.map.get()
    }

    pub fn observable(&self) -> &Observable<Arc<WatchedMap>> {
        &self.map
    }

    /// Calls `observer` with the current map now and after every applied batch.
    pub fn subscribe(&self, observer: impl Fn(&Arc<WatchedMap>) + Send + Sync + 'static) -> ObserverHandle {
        self.map.subscribe(observer)
    }

    fn on_batch(&self, generation: u64) -> BatchCallback {
        let state: Weak<Mutex<WatcherState>> = Arc::downgrade(&self.state);
        let map = self.map.clone();
        let collection = self.query.collection.clone();

        Arc::new(move |batch: FiresiteResult<Vec<Change>>| {
            let Some(state) = state.upgrade() else {
                return;
            };
            let snapshot = {
                let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                if !state.started || state.generation != generation {
                    trace!("dropping batch for {collection} from a stale subscription");
                    return;
                }
                match batch {
                    Ok(changes) => {
                        if state.fresh {
                            state.fresh = false;
                            state.docs.clear();
                        }
                        apply_changes(&mut state.docs, changes, &collection);
                        Arc::new(state.docs.clone())
                    }
                    Err(e) => {
                        error!("subscription on {collection} failed, keeping last known state: {e}");
                        return;
                    }
                }
            };
            map.set(snapshot);
        })
    }

    /// Opens the subscription. Does nothing when already started.
    pub fn start(&self) -> FiresiteResult<()> {
        let generation = {
            let mut state = self.lock();
            if state.started {
                return Ok(());
            }
            state.started = true;
            state.generation += 1;
            state.fresh = true;
            state.generation
        };
        debug!("starting watcher on {}", self.query.collection);

        match self.gateway.subscribe(&self.query, self.on_batch(generation)) {
            Ok(subscription) => {
                let mut state = self.lock();
                if state.started && state.generation == generation {
                    state.subscription = Some(subscription);
                } else {
                    // stopped while subscribing
                    drop(state);
                    subscription.unsubscribe();
                }
                Ok(())
            }
            Err(e) => {
                error!("failed to watch {}: {e}", self.query.collection);
                let mut state = self.lock();
                if state.generation == generation {
                    state.started = false;
                }
                Err(e)
            }
        }
    }

    /// Cancels the subscription. The map keeps its last state and the watcher
    /// may be started again.
    pub fn stop(&self) {
        let subscription = {
            let mut state = self.lock();
            if !state.started {
                return;
            }
            state.started = false;
            state.generation += 1;
            state.subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        debug!("stopped watcher on {}", self.query.collection);
    }
}

impl Drop for MapWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FilterOp, MemoryGateway};
    use proptest::{collection::vec, prelude::*};
    use serde_json::{json, Value};

    fn fields(value: Value) -> crate::Fields {
        value.as_object().cloned().unwrap()
    }

    fn ids(map: &WatchedMap) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    fn watcher(store: &Arc<MemoryGateway>, deferred: bool) -> MapWatcher {
        let gateway: Arc<dyn DocumentGateway> = store.clone();
        MapWatcher::new(gateway, Query::new("Page"), deferred).unwrap()
    }

    #[test]
    fn deferred_watcher_waits_for_start() {
        let store = Arc::new(MemoryGateway::new());
        store.set("Page", "a", fields(json!({"title": "A"})));

        let watcher = watcher(&store, true);
        assert!(!watcher.is_started());
        assert!(watcher.current().is_empty());
        assert_eq!(store.subscriber_count(), 0);

        watcher.start().unwrap();
        watcher.start().unwrap();
        assert_eq!(store.subscriber_count(), 1);
        assert_eq!(ids(&watcher.current()), vec!["a"]);
        assert_eq!(watcher.current()["a"].get_str("title"), Some("A"));
    }

    #[test]
    fn eager_watcher_starts_immediately() {
        let store = Arc::new(MemoryGateway::new());
        let watcher = watcher(&store, false);
        assert!(watcher.is_started());
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn observers_see_whole_batches() {
        let store = Arc::new(MemoryGateway::new());
        let watcher = watcher(&store, true);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let _handle = {
            let seen = seen.clone();
            watcher.subscribe(move |map| {
                seen.lock().unwrap().push(map.keys().cloned().collect::<Vec<_>>());
            })
        };
        watcher.start().unwrap();

        store.push_batch(
            "Page",
            vec![
                Change::added("a", fields(json!({}))),
                Change::added("b", fields(json!({}))),
                Change::removed("a"),
            ],
        );

        let seen = seen.lock().unwrap();
        // registration, initial empty snapshot, then one publish for the batch
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], vec!["b".to_string()]);
    }

    #[test]
    fn unknown_changes_and_errors_keep_state() {
        firesite_logger::init_logger("firesite-core");
        let store = Arc::new(MemoryGateway::new());
        store.set("Page", "a", fields(json!({"n": 1})));
        let watcher = watcher(&store, false);

        store.push_batch(
            "Page",
            vec![Change {
                kind: ChangeKind::Unknown,
                id: "a".into(),
                data: None,
            }],
        );
        store.push_error("Page", "permission denied");

        assert_eq!(ids(&watcher.current()), vec!["a"]);
        assert_eq!(watcher.current()["a"].get("n"), Some(&json!(1)));

        store.set("Page", "b", fields(json!({"n": 2})));
        assert_eq!(ids(&watcher.current()), vec!["a", "b"]);
    }

    #[test]
    fn stop_and_restart() {
        let store = Arc::new(MemoryGateway::new());
        store.set("Page", "a", fields(json!({})));
        let watcher = watcher(&store, false);

        watcher.stop();
        assert_eq!(store.subscriber_count(), 0);
        store.remove("Page", "a");
        store.set("Page", "b", fields(json!({})));
        // stopped: still serving the last known map
        assert_eq!(ids(&watcher.current()), vec!["a"]);

        watcher.start().unwrap();
        assert_eq!(ids(&watcher.current()), vec!["b"]);
    }

    #[test]
    fn watches_only_matching_documents() {
        let store = Arc::new(MemoryGateway::new());
        let gateway: Arc<dyn DocumentGateway> = store.clone();
        let query = Query::new("Page").filter("public", FilterOp::Eq, true);
        let watcher = MapWatcher::new(gateway, query, false).unwrap();

        store.set("Page", "a", fields(json!({"public": true})));
        store.set("Page", "b", fields(json!({"public": false})));
        assert_eq!(ids(&watcher.current()), vec!["a"]);

        store.set("Page", "a", fields(json!({"public": false})));
        assert!(watcher.current().is_empty());
    }

    #[test]
    fn dropping_watcher_unsubscribes() {
        let store = Arc::new(MemoryGateway::new());
        let watcher = watcher(&store, false);
        assert_eq!(store.subscriber_count(), 1);
        drop(watcher);
        assert_eq!(store.subscriber_count(), 0);
    }

    /// Keeps every callback it was given, ignoring cancellation.
    #[derive(Default)]
    struct LeakyGateway {
        callbacks: Mutex<Vec<BatchCallback>>,
    }

    #[async_trait::async_trait]
    impl DocumentGateway for LeakyGateway {
        async fn point_get(&self, _: &str, _: &str) -> FiresiteResult<Option<Document>> {
            Ok(None)
        }

        async fn fetch(&self, _: &Query, _: Option<usize>) -> FiresiteResult<Vec<Document>> {
            Ok(vec![])
        }

        fn subscribe(&self, _: &Query, on_batch: BatchCallback) -> FiresiteResult<Subscription> {
            self.callbacks.lock().unwrap().push(on_batch);
            Ok(Subscription::new(|| {}))
        }

        async fn create(&self, _: &str, _: crate::Fields) -> FiresiteResult<String> {
            Ok(String::new())
        }

        async fn update(&self, _: &str, _: &str, _: crate::Fields) -> FiresiteResult<()> {
            Ok(())
        }
    }

    #[test]
    fn late_batches_from_old_subscriptions_are_dropped() {
        let leaky = Arc::new(LeakyGateway::default());
        let gateway: Arc<dyn DocumentGateway> = leaky.clone();
        let watcher = MapWatcher::new(gateway, Query::new("Page"), false).unwrap();

        watcher.stop();
        watcher.start().unwrap();
        let callbacks = leaky.callbacks.lock().unwrap().clone();
        assert_eq!(callbacks.len(), 2);

        callbacks[0](Ok(vec![Change::added("stale", fields(json!({})))]));
        assert!(watcher.current().is_empty());

        callbacks[1](Ok(vec![Change::added("live", fields(json!({})))]));
        assert_eq!(ids(&watcher.current()), vec!["live"]);

        watcher.stop();
        callbacks[1](Ok(vec![Change::added("late", fields(json!({})))]));
        assert_eq!(ids(&watcher.current()), vec!["live"]);
    }

    fn change() -> impl Strategy<Value = Change> {
        (0..5u8, 0..3u8, any::<u8>()).prop_map(|(n, kind, v)| {
            let id = format!("d{n}");
            match kind {
                0 => Change::removed(id),
                1 => Change::added(id, fields(json!({"v": v}))),
                _ => Change::modified(id, fields(json!({"v": v}))),
            }
        })
    }

    proptest! {
        #[test]
        fn map_equals_fold_of_all_changes(batches in vec(vec(change(), 0..6), 1..8)) {
            let store = Arc::new(MemoryGateway::new());
            let watcher = watcher(&store, false);
            let mut expected = WatchedMap::new();

            for batch in batches {
                for change in batch.clone() {
                    match change.data {
                        Some(data) => {
                            expected.insert(change.id.clone(), Document::new(change.id, data));
                        }
                        None => {
                            expected.remove(&change.id);
                        }
                    }
                }
                store.push_batch("Page", batch);
                let current = watcher.current();
                prop_assert_eq!(&*current, &expected);
            }
        }
    }
}
