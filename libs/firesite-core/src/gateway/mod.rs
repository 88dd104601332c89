mod memory;

use super::{compare_values, Document, Fields, FiresiteResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{cmp::Ordering, sync::Arc};

pub use memory::MemoryGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let actual = doc.get(&self.field);
        match self.op {
            FilterOp::Eq => actual == Some(&self.value),
            FilterOp::Ne => actual.is_some() && actual != Some(&self.value),
            op => {
                // range filters only match values of the same kind
                let same_kind = matches!(
                    (actual, &self.value),
                    (Some(Value::Number(_)), Value::Number(_))
                        | (Some(Value::String(_)), Value::String(_))
                        | (Some(Value::Bool(_)), Value::Bool(_))
                );
                let ordering = compare_values(actual, Some(&self.value), false);
                same_kind
                    && match op {
                        FilterOp::Lt => ordering == Ordering::Less,
                        FilterOp::Le => ordering != Ordering::Greater,
                        FilterOp::Gt => ordering == Ordering::Greater,
                        _ => ordering != Ordering::Less,
                    }
            }
        }
    }
}

/// Describes a set of documents in one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Query {
    pub fn new<S: Into<String>>(collection: S) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn filter<F: Into<String>, V: Into<Value>>(mut self, field: F, op: FilterOp, value: V) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
    #[serde(other)]
    Unknown,
}

/// One entry of a change batch delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub id: String,
    #[serde(default)]
    pub data: Option<Fields>,
}

impl Change {
    pub fn added<S: Into<String>>(id: S, data: Fields) -> Self {
        Self {
            kind: ChangeKind::Added,
            id: id.into(),
            data: Some(data),
        }
    }

    pub fn modified<S: Into<String>>(id: S, data: Fields) -> Self {
        Self {
            kind: ChangeKind::Modified,
            id: id.into(),
            data: Some(data),
        }
    }

    pub fn removed<S: Into<String>>(id: S) -> Self {
        Self {
            kind: ChangeKind::Removed,
            id: id.into(),
            data: None,
        }
    }
}

/// Receives each change batch of a subscription in delivery order, or the
/// error that interrupted delivery.
pub type BatchCallback = Arc<dyn Fn(FiresiteResult<Vec<Change>>) + Send + Sync>;

/// Live subscription handle; cancels on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// No callback of this subscription starts after this returns.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// The remote document database.
#[async_trait]
pub trait DocumentGateway: Send + Sync {
    /// Looks up a document by primary id; `None` when absent.
    async fn point_get(&self, collection: &str, id: &str) -> FiresiteResult<Option<Document>>;

    /// Runs `query` once. `limit` overrides the query's own limit.
    async fn fetch(&self, query: &Query, limit: Option<usize>) -> FiresiteResult<Vec<Document>>;

    /// Watches `query`. The first batch lists the full current result set as
    /// `added` changes; later batches carry incremental changes.
    fn subscribe(&self, query: &Query, on_batch: BatchCallback) -> FiresiteResult<Subscription>;

    /// Creates a document and returns its store-assigned id.
    async fn create(&self, collection: &str, fields: Fields) -> FiresiteResult<String>;

    /// Partially updates an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> FiresiteResult<()>;

    fn query(&self, collection: &str, filters: Vec<Filter>) -> Query {
        Query {
            collection: collection.into(),
            filters,
            limit: None,
        }
    }
}

/// How a single document is located.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    ById { collection: String, id: String },
    ByQuery(Query),
}

impl Lookup {
    pub fn by_id<C: Into<String>, I: Into<String>>(collection: C, id: I) -> Self {
        Self::ById {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

pub async fn get_docs(
    gateway: &dyn DocumentGateway,
    query: &Query,
    limit: Option<usize>,
) -> FiresiteResult<Vec<Document>> {
    gateway.fetch(query, limit).await
}

/// Resolves a lookup to at most one document; a query yields its first result.
pub async fn get_doc(gateway: &dyn DocumentGateway, lookup: &Lookup) -> FiresiteResult<Option<Document>> {
    match lookup {
        Lookup::ById { collection, id } => gateway.point_get(collection, id).await,
        Lookup::ByQuery(query) => Ok(gateway.fetch(query, Some(1)).await?.into_iter().next()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        let fields = value.as_object().cloned().unwrap();
        Document::new("d", fields)
    }

    #[test]
    fn filters_match_documents() {
        let page = doc(json!({"title": "About", "order": 3, "draft": false}));

        assert!(Query::new("Page").filter("title", FilterOp::Eq, "About").matches(&page));
        assert!(!Query::new("Page").filter("title", FilterOp::Eq, "about").matches(&page));
        assert!(Query::new("Page").filter("order", FilterOp::Ge, 3).matches(&page));
        assert!(Query::new("Page")
            .filter("order", FilterOp::Lt, 4)
            .filter("draft", FilterOp::Eq, false)
            .matches(&page));
        assert!(!Query::new("Page").filter("order", FilterOp::Gt, "1").matches(&page));
        assert!(!Query::new("Page").filter("missing", FilterOp::Ne, 1).matches(&page));
        assert!(Query::new("Page").filter("order", FilterOp::Ne, 1).matches(&page));
    }

    #[test]
    fn changes_deserialize_from_feed_records() {
        let changes: Vec<Change> = serde_json::from_value(json!([
            {"type": "added", "id": "a", "data": {"n": 1}},
            {"type": "removed", "id": "b"},
            {"type": "metadata", "id": "c"},
        ]))
        .unwrap();

        assert_eq!(changes[0], Change::added("a", json!({"n": 1}).as_object().cloned().unwrap()));
        assert_eq!(changes[1], Change::removed("b"));
        assert_eq!(changes[2].kind, ChangeKind::Unknown);
    }

    #[test]
    fn dropping_subscription_cancels_once() {
        use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

        let cancelled = Arc::new(AtomicUsize::new(0));
        let sub = {
            let cancelled = cancelled.clone();
            Subscription::new(move || {
                cancelled.fetch_add(1, SeqCst);
            })
        };
        sub.unsubscribe();
        assert_eq!(cancelled.load(SeqCst), 1);
    }
}
