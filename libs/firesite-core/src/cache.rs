use super::{constants::field, now, trace, Document, DocumentGateway, Fields, FiresiteError, FiresiteResult};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};

/// Id-keyed cache of individually fetched documents of one collection.
///
/// Entries are never evicted. Concurrent `get`s of the same uncached id share
/// a single point lookup.
pub struct CollectionCache {
    collection: String,
    gateway: Arc<dyn DocumentGateway>,
    records: RwLock<HashMap<String, Document>>,
    fetching: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CollectionCache {
    pub fn new<S: Into<String>>(gateway: Arc<dyn DocumentGateway>, collection: S) -> Self {
        Self {
            collection: collection.into(),
            gateway,
            records: RwLock::default(),
            fetching: Mutex::default(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The cached copy of `id`, without touching the gateway.
    pub async fn cached(&self, id: &str) -> Option<Document> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.records.read().await.contains_key(id)
    }

    pub async fn get(&self, id: &str) -> FiresiteResult<Document> {
        if let Some(doc) = self.cached(id).await {
            return Ok(doc);
        }

        let slot = self.fetching.lock().await.entry(id.to_string()).or_default().clone();
        let result = {
            let _fetch = slot.lock().await;
            // another caller may have finished the fetch while we waited
            match self.cached(id).await {
                Some(doc) => Ok(doc),
                None => self.fetch(id).await,
            }
        };

        let mut fetching = self.fetching.lock().await;
        if fetching.get(id).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
            fetching.remove(id);
        }
        result
    }

    async fn fetch(&self, id: &str) -> FiresiteResult<Document> {
        trace!("cache miss for {}/{id}, fetching", self.collection);
        match self.gateway.point_get(&self.collection, id).await? {
            Some(doc) => {
                self.records.write().await.insert(id.to_string(), doc.clone());
                Ok(doc)
            }
            None => Err(FiresiteError::NotFound {
                collection: self.collection.clone(),
                id: id.to_string(),
            }),
        }
    }

    /// Writes `fields` through to the gateway, stamping `lastmod`, and merges
    /// them into the cached copy once the write is confirmed.
    ///
    /// The document must have been loaded with [`CollectionCache::get`] first.
    pub async fn update(&self, id: &str, mut fields: Fields) -> FiresiteResult<()> {
        if !self.contains(id).await {
            return Err(FiresiteError::InvalidState(format!(
                "attempted to update a document ({}/{id}) that has not been loaded",
                self.collection
            )));
        }
        fields.insert(field::LASTMOD.into(), Value::from(now()));

        self.gateway.update(&self.collection, id, fields.clone()).await?;

        if let Some(doc) = self.records.write().await.get_mut(id) {
            doc.merge(&fields);
        }
        Ok(())
    }
}
