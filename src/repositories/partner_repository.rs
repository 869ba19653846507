use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::{AppError, Result};
use crate::models::Partner;
use crate::store::{collections, DocumentStore, FieldUpdate};

/// Repository for partner reads and stored-balance overwrites.
pub struct PartnerRepository {
    store: Arc<dyn DocumentStore>,
}

impl PartnerRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn find_all(&self) -> Result<Vec<Partner>> {
        let docs = self.store.get_all(collections::PARTNERS).await?;
        docs.iter()
            .map(|d| d.to_model::<Partner>().map_err(AppError::from))
            .collect()
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Partner>> {
        let docs = self
            .store
            .query_by_field(collections::PARTNERS, "id", &serde_json::json!(id))
            .await?;
        docs.first()
            .map(|d| d.to_model::<Partner>().map_err(AppError::from))
            .transpose()
    }

    /// Overwrites stored balances wholesale, split at the batch ceiling.
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
                .update_batch(collections::PARTNERS, updates)
                .await?;
        }
        Ok(())
    }
}
