use super::{
    super::{debug, warn, FiresiteError},
    *,
};
use nanoid::nanoid;
use std::{
    collections::{BTreeMap, HashMap},
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

struct MemoryWatch {
    query: Query,
    callback: BatchCallback,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    watches: HashMap<u64, MemoryWatch>,
    next_watch: u64,
    fail_next_update: Option<String>,
}

/// In-process document store. Change batches are delivered synchronously,
/// from the thread performing the write, after internal locks are released.
///
/// Subscriptions ignore query limits.
#[derive(Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<MemoryState>>,
    point_gets: AtomicUsize,
}

fn to_document(id: &str, fields: &Fields) -> Document {
    Document::new(id, fields.clone())
}

fn deliver(pending: Vec<(BatchCallback, FiresiteResult<Vec<Change>>)>) {
    for (callback, batch) in pending {
        catch_unwind(AssertUnwindSafe(|| callback(batch))).unwrap_or_else(|e| {
            warn!("subscriber panicked: {:?}", e);
        });
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of `point_get` calls served so far.
    pub fn point_get_count(&self) -> usize {
        self.point_gets.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().watches.len()
    }

    /// Makes the next `update` fail with `message` without touching any data.
    pub fn fail_next_update<S: Into<String>>(&self, message: S) {
        self.lock().fail_next_update = Some(message.into());
    }

    /// Current stored fields of a document, without the id.
    pub fn stored(&self, collection: &str, id: &str) -> Option<Fields> {
        self.lock().collections.get(collection)?.get(id).cloned()
    }

    /// Replaces a document wholesale and notifies matching subscriptions.
    pub fn set<C: Into<String>, I: Into<String>>(&self, collection: C, id: I, fields: Fields) {
        let (collection, id) = (collection.into(), id.into());
        let pending = {
            let mut state = self.lock();
            let before = state.collections.get(&collection).and_then(|c| c.get(&id)).cloned();
            state
                .collections
                .entry(collection.clone())
                .or_default()
                .insert(id.clone(), fields.clone());
            Self::changes(&state, &collection, &id, before.as_ref(), Some(&fields))
        };
        deliver(pending);
    }

    pub fn remove(&self, collection: &str, id: &str) -> bool {
        let pending = {
            let mut state = self.lock();
            let Some(before) = state.collections.get_mut(collection).and_then(|c| c.remove(id)) else {
                return false;
            };
            Self::changes(&state, collection, id, Some(&before), None)
        };
        deliver(pending);
        true
    }

    /// Sends a raw batch to every subscription on `collection`.
    pub fn push_batch(&self, collection: &str, batch: Vec<Change>) {
        let pending = self
            .lock()
            .watches
            .values()
            .filter(|w| w.query.collection == collection)
            .map(|w| (w.callback.clone(), Ok(batch.clone())))
            .collect();
        deliver(pending);
    }

    /// Sends a delivery error to every subscription on `collection`.
    pub fn push_error(&self, collection: &str, message: &str) {
        let pending = self
            .lock()
            .watches
            .values()
            .filter(|w| w.query.collection == collection)
            .map(|w| {
                let error = FiresiteError::Subscription(message.to_string());
                (w.callback.clone(), Err(error))
            })
            .collect();
        deliver(pending);
    }

    fn changes(
        state: &MemoryState,
        collection: &str,
        id: &str,
        before: Option<&Fields>,
        after: Option<&Fields>,
    ) -> Vec<(BatchCallback, FiresiteResult<Vec<Change>>)> {
        let before = before.map(|f| to_document(id, f));
        let after = after.map(|f| to_document(id, f));

        state
            .watches
            .values()
            .filter(|w| w.query.collection == collection)
            .filter_map(|w| {
                let was = before.as_ref().is_some_and(|d| w.query.matches(d));
                let is = after.as_ref().is_some_and(|d| w.query.matches(d));
                let change = match (was, is, &after) {
                    (false, true, Some(doc)) => Change::added(id, doc.fields().clone()),
                    (true, true, Some(doc)) => Change::modified(id, doc.fields().clone()),
                    (true, false, _) => Change::removed(id),
                    _ => return None,
                };
                Some((w.callback.clone(), Ok(vec![change])))
            })
            .collect()
    }

    fn matching(state: &MemoryState, query: &Query) -> Vec<Document> {
        state
            .collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| to_document(id, fields))
                    .filter(|doc| query.matches(doc))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentGateway for MemoryGateway {
    async fn point_get(&self, collection: &str, id: &str) -> FiresiteResult<Option<Document>> {
        self.point_gets.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| to_document(id, fields)))
    }

    async fn fetch(&self, query: &Query, limit: Option<usize>) -> FiresiteResult<Vec<Document>> {
        let mut docs = Self::matching(&self.lock(), query);
        if let Some(limit) = limit.or(query.limit) {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    fn subscribe(&self, query: &Query, on_batch: BatchCallback) -> FiresiteResult<Subscription> {
        let (id, initial) = {
            let mut state = self.lock();
            let initial = Self::matching(&state, query)
                .into_iter()
                .map(|doc| {
                    let id = doc.id().to_string();
                    Change::added(id, doc.into_fields())
                })
                .collect::<Vec<_>>();
            let id = state.next_watch;
            state.next_watch += 1;
            state.watches.insert(
                id,
                MemoryWatch {
                    query: query.clone(),
                    callback: on_batch.clone(),
                },
            );
            (id, initial)
        };
        debug!("memory subscription {id} on {}", query.collection);
        deliver(vec![(on_batch, Ok(initial))]);

        let state = Arc::downgrade(&self.state);
        Ok(Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.lock().unwrap_or_else(|e| e.into_inner()).watches.remove(&id);
                debug!("memory subscription {id} cancelled");
            }
        }))
    }

    async fn create(&self, collection: &str, fields: Fields) -> FiresiteResult<String> {
        let id = nanoid!();
        self.set(collection, id.clone(), fields);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> FiresiteResult<()> {
        let pending = {
            let mut state = self.lock();
            if let Some(message) = state.fail_next_update.take() {
                return Err(FiresiteError::Gateway(message));
            }
            let Some(current) = state.collections.get_mut(collection).and_then(|c| c.get_mut(id)) else {
                return Err(FiresiteError::NotFound {
                    collection: collection.into(),
                    id: id.into(),
                });
            };
            let before = current.clone();
            for (key, value) in fields {
                current.insert(key, value);
            }
            let after = current.clone();
            Self::changes(&state, collection, id, Some(&before), Some(&after))
        };
        deliver(pending);
        Ok(())
    }
}
