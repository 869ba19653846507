use std::sync::Arc;

use serde_json::json;

use crate::error::Result;
use crate::models::LedgerEntry;
use crate::store::{collections, Document, DocumentStore};

/// Repository for ledger entry reads and append/delete-only writes.
///
/// Appends and deletes are pre-split at the store's batch ceiling; batches
/// are committed sequentially.
pub struct LedgerRepository {
    store: Arc<dyn DocumentStore>,
}

impl LedgerRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Reads the whole ledger. Entries whose body does not deserialize are
    /// skipped and logged rather than failing the scan.
    pub async fn find_all(&self) -> Result<Vec<LedgerEntry>> {
        let docs = self.store.get_all(collections::LEDGER_ENTRIES).await?;
        Ok(Self::deserialize_lossy(docs))
    }

    /// Reads every entry in one transaction group.
    pub async fn find_by_transaction(&self, transaction_id: &str) -> Result<Vec<LedgerEntry>> {
        let docs = self
            .store
            .query_by_field(
                collections::LEDGER_ENTRIES,
                "transaction_id",
                &json!(transaction_id),
            )
            .await?;
        Ok(Self::deserialize_lossy(docs))
    }

    /// Reads every entry posted against one account or partner.
    pub async fn find_by_account(&self, account_id: &str) -> Result<Vec<LedgerEntry>> {
        let docs = self
            .store
            .query_by_field(collections::LEDGER_ENTRIES, "account_id", &json!(account_id))
            .await?;
        Ok(Self::deserialize_lossy(docs))
    }

    /// Appends entries, split into ceiling-sized batches committed in order.
    pub async fn append(&self, entries: &[LedgerEntry]) -> Result<()> {
        let ceiling = self.store.max_batch_ops();
        for chunk in entries.chunks(ceiling) {
            let docs = chunk
                .iter()
                .map(|e| Document::from_model(e.id.clone(), e))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            self.store
                .append_batch(collections::LEDGER_ENTRIES, docs)
                .await?;
        }
        Ok(())
    }

    /// Removes every entry in a transaction group. Returns the number of
    /// entries deleted.
    pub async fn delete_by_transaction(&self, transaction_id: &str) -> Result<usize> {
        let docs = self
            .store
            .query_by_field(
                collections::LEDGER_ENTRIES,
                "transaction_id",
                &json!(transaction_id),
            )
            .await?;
        let ids: Vec<String> = docs.into_iter().map(|d| d.id).collect();
        let deleted = ids.len();

        let ceiling = self.store.max_batch_ops();
        for chunk in ids.chunks(ceiling) {
            self.store
                .delete_batch(collections::LEDGER_ENTRIES, chunk.to_vec())
                .await?;
        }
        Ok(deleted)
    }

    fn deserialize_lossy(docs: Vec<Document>) -> Vec<LedgerEntry> {
        docs.into_iter()
            .filter_map(|doc| match doc.to_model::<LedgerEntry>() {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(doc_id = %doc.id, error = %err, "skipping malformed ledger entry");
                    None
                }
            })
            .collect()
    }
}
