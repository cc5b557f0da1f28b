use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{merge_patch, Document, DocumentStore, Query, StoreError, StoreResult};

/// In-process document store. Backs tests and `STORE_BACKEND=memory`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Document>>,
    failing_writes: HashSet<String>,
}

impl Inner {
    fn check_writable(&self, collection: &str) -> StoreResult<()> {
        if self.failing_writes.contains(collection) {
            return Err(StoreError::Backend(format!(
                "writes to {collection} are unavailable"
            )));
        }
        Ok(())
    }

    fn insert(&mut self, collection: &str, body: Value) -> StoreResult<String> {
        if !body.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let id = Uuid::new_v4().to_string();
        self.collections.entry(collection.to_string()).or_default().insert(
            id.clone(),
            Document {
                id: id.clone(),
                version: 1,
                body,
            },
        );
        Ok(id)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write to `collection` fail until `restore_writes` is called.
    pub async fn fail_writes(&self, collection: &str) {
        self.inner
            .write()
            .await
            .failing_writes
            .insert(collection.to_string());
    }

    pub async fn restore_writes(&self, collection: &str) {
        self.inner.write().await.failing_writes.remove(collection);
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .collections
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, body: Value) -> StoreResult<String> {
        let mut inner = self.inner.write().await;
        inner.check_writable(collection)?;
        inner.insert(collection, body)
    }

    async fn put(&self, collection: &str, id: &str, body: Value) -> StoreResult<()> {
        if !body.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let mut inner = self.inner.write().await;
        inner.check_writable(collection)?;
        let docs = inner.collections.entry(collection.to_string()).or_default();
        let version = docs.get(id).map(|d| d.version + 1).unwrap_or(1);
        docs.insert(
            id.to_string(),
            Document {
                id: id.to_string(),
                version,
                body,
            },
        );
        Ok(())
    }

    async fn create_unless_exists(
        &self,
        collection: &str,
        guard: &Query,
        body: Value,
    ) -> StoreResult<Option<String>> {
        let mut inner = self.inner.write().await;
        inner.check_writable(collection)?;
        let exists = inner
            .collections
            .get(collection)
            .map(|docs| docs.values().any(|d| guard.matches(&d.body)))
            .unwrap_or(false);
        if exists {
            return Ok(None);
        }
        inner.insert(collection, body).map(Some)
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let inner = self.inner.read().await;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let inner = self.inner.read().await;
        let mut docs: Vec<Document> = inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|d| query.matches(&d.body))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        query.arrange(&mut docs);
        Ok(docs)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.check_writable(collection)?;
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_patch(&mut doc.body, patch)?;
        doc.version += 1;
        Ok(())
    }

    async fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        patch: Value,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        inner.check_writable(collection)?;
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        if doc.version != expected_version {
            return Ok(false);
        }
        merge_patch(&mut doc.body, patch)?;
        doc.version += 1;
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.check_writable(collection)?;
        if let Some(docs) = inner.collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}
