use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Document, DocumentStore, FieldUpdate, StoreError, StoreResult};

/// Default per-batch operation ceiling, matching the hosted store's limit
/// with headroom below the hard cap of 500.
pub const DEFAULT_BATCH_CEILING: usize = 450;

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// In-memory document store.
///
/// Serves as the test double for the hosted database and as the backing
/// store when the console operates on an exported JSON snapshot.
pub struct MemoryStore {
    collections: RwLock<Collections>,
    batch_ceiling: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_batch_ceiling(DEFAULT_BATCH_CEILING)
    }

    pub fn with_batch_ceiling(batch_ceiling: usize) -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            batch_ceiling,
        }
    }

    /// Loads a snapshot file: a JSON object mapping collection name to an
    /// array of documents, each document an object with an `id` field.
    pub fn from_snapshot(path: &Path, batch_ceiling: usize) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: BTreeMap<String, Vec<Value>> = serde_json::from_str(&raw)?;

        let mut collections = Collections::new();
        for (name, docs) in parsed {
            let mut by_id = BTreeMap::new();
            for doc in docs {
                let id = doc
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| StoreError::Commit(format!(
                        "snapshot document in '{}' has no string 'id'",
                        name
                    )))?
                    .to_string();
                by_id.insert(id, doc);
            }
            collections.insert(name, by_id);
        }

        Ok(Self {
            collections: RwLock::new(collections),
            batch_ceiling,
        })
    }

    /// Writes the current contents back out in the snapshot format.
    pub async fn dump_snapshot(&self, path: &Path) -> StoreResult<()> {
        let raw = {
            let guard = self.collections.read().await;
            let view: BTreeMap<&String, Vec<&Value>> = guard
                .iter()
                .map(|(name, docs)| (name, docs.values().collect()))
                .collect();
            serde_json::to_string_pretty(&view)?
        };
        tokio::fs::write(path, raw).await?;
        Ok(())
    }

    /// Number of documents currently in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    fn check_ceiling(&self, size: usize) -> StoreResult<()> {
        if size > self.batch_ceiling {
            return Err(StoreError::BatchTooLarge {
                size,
                ceiling: self.batch_ceiling,
            });
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let guard = self.collections.read().await;
        let docs = guard
            .get(collection)
            .map(|c| {
                c.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        let guard = self.collections.read().await;
        let docs = guard
            .get(collection)
            .map(|c| {
                c.iter()
                    .filter(|(_, data)| data.get(field) == Some(value))
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn append_batch(&self, collection: &str, docs: Vec<Document>) -> StoreResult<()> {
        self.check_ceiling(docs.len())?;
        let mut guard = self.collections.write().await;
        let target = guard.entry(collection.to_string()).or_default();
        for doc in docs {
            target.insert(doc.id, doc.data);
        }
        Ok(())
    }

    async fn update_batch(&self, collection: &str, updates: Vec<FieldUpdate>) -> StoreResult<()> {
        self.check_ceiling(updates.len())?;
        let mut guard = self.collections.write().await;
        let target = guard
            .get_mut(collection)
            .ok_or_else(|| StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: updates
                    .first()
                    .map(|u| u.doc_id.clone())
                    .unwrap_or_default(),
            })?;

        // Validate the whole batch before mutating so a bad id cannot leave
        // the batch half-applied.
        for update in &updates {
            if !target.contains_key(&update.doc_id) {
                return Err(StoreError::DocumentNotFound {
                    collection: collection.to_string(),
                    id: update.doc_id.clone(),
                });
            }
        }

        for update in updates {
            if let Some(Value::Object(body)) = target.get_mut(&update.doc_id) {
                for (field, value) in update.fields {
                    body.insert(field, value);
                }
            }
        }
        Ok(())
    }

    async fn delete_batch(&self, collection: &str, ids: Vec<String>) -> StoreResult<()> {
        self.check_ceiling(ids.len())?;
        let mut guard = self.collections.write().await;
        if let Some(target) = guard.get_mut(collection) {
            for id in ids {
                target.remove(&id);
            }
        }
        Ok(())
    }

    fn max_batch_ops(&self) -> usize {
        self.batch_ceiling
    }
}
