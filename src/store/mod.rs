//! The document store the engine reconciles against.
//!
//! The real deployment sits on a hosted document database; the engine only
//! depends on this narrow trait: query by field, full-collection reads and
//! batched mutations with a hard per-call operation ceiling. Implementations
//! must provide consistent reads after a committed batch.

pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use memory::MemoryStore;

/// Collection names used across the system.
pub mod collections {
    pub const LEDGER_ENTRIES: &str = "ledger_entries";
    pub const ACCOUNTS: &str = "accounts";
    pub const PARTNERS: &str = "partners";
    pub const PURCHASES: &str = "purchases";
    pub const SALES_INVOICES: &str = "sales_invoices";
    pub const PRODUCTIONS: &str = "productions";
    pub const ORIGINAL_OPENINGS: &str = "original_openings";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A batch call exceeded the store's per-call operation ceiling.
    #[error("batch of {size} operations exceeds the ceiling of {ceiling}")]
    BatchTooLarge { size: usize, ceiling: usize },

    #[error("document '{id}' not found in collection '{collection}'")]
    DocumentNotFound { collection: String, id: String },

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch commit failed: {0}")]
    Commit(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One stored document: an id plus a JSON body.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Serializes a model into a document keyed by `id`.
    pub fn from_model<T: Serialize>(id: impl Into<String>, model: &T) -> StoreResult<Self> {
        Ok(Self {
            id: id.into(),
            data: serde_json::to_value(model)?,
        })
    }

    /// Deserializes the document body into a model.
    pub fn to_model<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Reads a top-level field, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// A single-document field overwrite inside a batched update.
#[derive(Debug, Clone)]
pub struct FieldUpdate {
    pub doc_id: String,
    pub fields: serde_json::Map<String, Value>,
}

impl FieldUpdate {
    pub fn set(doc_id: impl Into<String>, field: &str, value: Value) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert(field.to_string(), value);
        Self {
            doc_id: doc_id.into(),
            fields,
        }
    }
}

/// The Ledger Store collaborator.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads every document in a collection.
    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Document>>;

    /// Reads documents whose top-level `field` equals `value`.
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>>;

    /// Atomically appends documents. Rejects batches over the ceiling.
    async fn append_batch(&self, collection: &str, docs: Vec<Document>) -> StoreResult<()>;

    /// Atomically overwrites fields on existing documents. Rejects batches
    /// over the ceiling.
    async fn update_batch(&self, collection: &str, updates: Vec<FieldUpdate>) -> StoreResult<()>;

    /// Atomically deletes documents by id. Rejects batches over the ceiling.
    /// Ids not present are ignored.
    async fn delete_batch(&self, collection: &str, ids: Vec<String>) -> StoreResult<()>;

    /// Maximum mutation operations accepted per batch call.
    fn max_batch_ops(&self) -> usize;
}
