use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{LedgerEntry, NormalSide, SignPolicy};
use crate::repositories::{AccountRepository, LedgerRepository, PartnerRepository};
use crate::store::DocumentStore;

/// Derives an owner's balance from its ledger entries.
///
/// Debit-normal owners (assets, expenses, customers) accumulate
/// debits minus credits; credit-normal owners the reverse. An owner with no
/// entries derives to exactly zero.
pub fn derive_balance(entries: &[LedgerEntry], side: NormalSide) -> Decimal {
    let debit: Decimal = entries.iter().map(|e| e.debit).sum();
    let credit: Decimal = entries.iter().map(|e| e.credit).sum();
    match side {
        NormalSide::Debit => debit - credit,
        NormalSide::Credit => credit - debit,
    }
}

/// Outcome of a full stored-balance recalculation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecalcSummary {
    pub accounts_updated: usize,
    pub partners_updated: usize,
    pub unchanged: usize,
    pub errors: Vec<RecalcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalcError {
    pub entity_id: String,
    pub message: String,
}

/// Rewrites stored Account/Partner balances from a full re-derivation over
/// the ledger. Balances are overwritten wholesale, never incremented, so
/// concurrent partial updates cannot race each other into a lost update.
pub struct BalanceService {
    ledger_repo: LedgerRepository,
    account_repo: AccountRepository,
    partner_repo: PartnerRepository,
    policy: SignPolicy,
    tolerance: Decimal,
}

impl BalanceService {
    pub fn new(store: Arc<dyn DocumentStore>, policy: SignPolicy, tolerance: Decimal) -> Self {
        Self {
            ledger_repo: LedgerRepository::new(store.clone()),
            account_repo: AccountRepository::new(store.clone()),
            partner_repo: PartnerRepository::new(store),
            policy,
            tolerance,
        }
    }

    /// Recalculates every stored balance. Owners whose stored value already
    /// matches the derivation (within tolerance) are left untouched. A
    /// failing write batch is recorded and the run continues.
    pub async fn recalculate_all(&self) -> Result<RecalcSummary> {
        let entries = self.ledger_repo.find_all().await?;
        let by_owner = index_by_owner(&entries);

        let mut summary = RecalcSummary::default();
        let empty: Vec<LedgerEntry> = Vec::new();

        let accounts = self.account_repo.find_all().await?;
        let mut account_updates = Vec::new();
        for account in &accounts {
            let owned = by_owner.get(account.id.as_str()).unwrap_or(&empty);
            let derived = derive_balance(owned, account.normal_side());
            if (derived - account.balance).abs() > self.tolerance {
                account_updates.push((account.id.clone(), derived));
            } else {
                summary.unchanged += 1;
            }
        }

        let partners = self.partner_repo.find_all().await?;
        let mut partner_updates = Vec::new();
        for partner in &partners {
            let owned = by_owner.get(partner.id.as_str()).unwrap_or(&empty);
            let derived = derive_balance(owned, partner.normal_side(&self.policy));
            if (derived - partner.balance).abs() > self.tolerance {
                partner_updates.push((partner.id.clone(), derived));
            } else {
                summary.unchanged += 1;
            }
        }

        match self.account_repo.update_balances(&account_updates).await {
            Ok(()) => summary.accounts_updated = account_updates.len(),
            Err(err) => summary.errors.push(RecalcError {
                entity_id: "accounts".to_string(),
                message: err.to_string(),
            }),
        }

        match self.partner_repo.update_balances(&partner_updates).await {
            Ok(()) => summary.partners_updated = partner_updates.len(),
            Err(err) => summary.errors.push(RecalcError {
                entity_id: "partners".to_string(),
                message: err.to_string(),
            }),
        }

        tracing::info!(
            accounts = summary.accounts_updated,
            partners = summary.partners_updated,
            unchanged = summary.unchanged,
            errors = summary.errors.len(),
            "balance recalculation finished"
        );
        Ok(summary)
    }
}

/// Indexes entries by the account/partner they are posted against.
fn index_by_owner(entries: &[LedgerEntry]) -> HashMap<&str, Vec<LedgerEntry>> {
    let mut by_owner: HashMap<&str, Vec<LedgerEntry>> = HashMap::new();
    for entry in entries {
        by_owner
            .entry(entry.account_id.as_str())
            .or_default()
            .push(entry.clone());
    }
    by_owner
}
