use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::{AppError, Result};
use crate::models::Account;
use crate::store::{collections, DocumentStore, FieldUpdate};

/// Repository for chart-of-accounts reads and stored-balance overwrites.
pub struct AccountRepository {
    store: Arc<dyn DocumentStore>,
}

impl AccountRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn find_all(&self) -> Result<Vec<Account>> {
        let docs = self.store.get_all(collections::ACCOUNTS).await?;
        docs.iter()
            .map(|d| d.to_model::<Account>().map_err(AppError::from))
            .collect()
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let docs = self
            .store
            .query_by_field(collections::ACCOUNTS, "id", &serde_json::json!(id))
            .await?;
        docs.first()
            .map(|d| d.to_model::<Account>().map_err(AppError::from))
            .transpose()
    }

    /// Overwrites stored balances wholesale, split at the batch ceiling.
    /// Balances are never incremented in place.
    pub async fn update_balances(&self, balances: &[(String, Decimal)]) -> Result<()> {
        let ceiling = self.store.max_batch_ops();
        for chunk in balances.chunks(ceiling) {
            let updates = chunk
                .iter()
                .map(|(id, balance)| {
                    FieldUpdate::set(id.clone(), "balance", serde_json::json!(balance))
                })
                .collect();
            self.store
                .update_batch(collections::ACCOUNTS, updates)
                .await?;
        }
        Ok(())
    }
}
