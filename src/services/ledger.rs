use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::{AppError, Result};
use crate::models::LedgerEntry;
use crate::repositories::LedgerRepository;
use crate::store::DocumentStore;

/// Posting and deletion of transaction groups.
///
/// Entries are append-only; the only mutation ever applied to a posted group
/// is whole-group deletion, and that is gated behind an authorization code at
/// the API layer.
pub struct LedgerService {
    ledger_repo: LedgerRepository,
}

impl LedgerService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            ledger_repo: LedgerRepository::new(store),
        }
    }

    /// Posts one transaction group. All entries must share one non-empty
    /// transaction id and carry non-negative amounts; large groups are split
    /// at the store's batch ceiling.
    pub async fn post_transaction(&self, entries: &[LedgerEntry]) -> Result<usize> {
        let first = entries
            .first()
            .ok_or_else(|| AppError::Validation("transaction has no entries".to_string()))?;
        if first.transaction_id.is_empty() {
            return Err(AppError::Validation(
                "transaction id must not be empty".to_string(),
            ));
        }
        for entry in entries {
            if entry.transaction_id != first.transaction_id {
                return Err(AppError::Validation(format!(
                    "entries span multiple transaction ids: '{}' and '{}'",
                    first.transaction_id, entry.transaction_id
                )));
            }
            if entry.debit < Decimal::ZERO || entry.credit < Decimal::ZERO {
                return Err(AppError::Validation(format!(
                    "entry for account '{}' carries a negative amount",
                    entry.account_id
                )));
            }
        }

        self.ledger_repo.append(entries).await?;
        tracing::info!(
            transaction_id = %first.transaction_id,
            entries = entries.len(),
            "transaction posted"
        );
        Ok(entries.len())
    }

    /// Deletes a whole transaction group, logging who asked and why.
    pub async fn delete_transaction(
        &self,
        transaction_id: &str,
        reason: &str,
        actor: &str,
    ) -> Result<usize> {
        let deleted = self.ledger_repo.delete_by_transaction(transaction_id).await?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!(
                "transaction '{}' has no ledger entries",
                transaction_id
            )));
        }

        tracing::warn!(
            transaction_id = %transaction_id,
            entries = deleted,
            reason = %reason,
            actor = %actor,
            "transaction group deleted"
        );
        Ok(deleted)
    }
}
