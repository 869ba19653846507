use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{LedgerEntry, NormalSide, SignPolicy};
use crate::repositories::{AccountRepository, LedgerRepository, PartnerRepository};
use crate::services::balance::derive_balance;
use crate::services::grouping::group_by_transaction;
use crate::store::DocumentStore;

/// A transaction group whose debits and credits disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnbalancedTransaction {
    pub transaction_id: String,
    pub debit_total: Decimal,
    pub credit_total: Decimal,
    /// Absolute difference.
    pub imbalance: Decimal,
    /// Side carrying the excess.
    pub excess: NormalSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerKind {
    Account,
    Partner,
}

/// An account or partner whose stored balance disagrees with the value
/// derived from its ledger history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceMismatch {
    pub owner_kind: OwnerKind,
    pub owner_id: String,
    pub owner_name: String,
    pub stored: Decimal,
    pub derived: Decimal,
    pub delta: Decimal,
}

/// The primary artifact a repair run consumes: every offending transaction
/// and owner with its numeric deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImbalanceReport {
    pub unbalanced: Vec<UnbalancedTransaction>,
    pub mismatches: Vec<BalanceMismatch>,
    pub transactions_scanned: usize,
    pub global_debit: Decimal,
    pub global_credit: Decimal,
    /// Nonzero net over the whole ledger indicates a systemic defect
    /// independent of any single transaction.
    pub global_net: Decimal,
}

impl ImbalanceReport {
    pub fn is_clean(&self) -> bool {
        self.unbalanced.is_empty() && self.mismatches.is_empty() && self.global_net.is_zero()
    }
}

/// Detects per-transaction imbalances and stored-vs-derived balance drift.
pub struct AuditService {
    ledger_repo: LedgerRepository,
    account_repo: AccountRepository,
    partner_repo: PartnerRepository,
    policy: SignPolicy,
    tolerance: Decimal,
}

impl AuditService {
    pub fn new(store: Arc<dyn DocumentStore>, policy: SignPolicy, tolerance: Decimal) -> Self {
        Self {
            ledger_repo: LedgerRepository::new(store.clone()),
            account_repo: AccountRepository::new(store.clone()),
            partner_repo: PartnerRepository::new(store),
            policy,
            tolerance,
        }
    }

    /// Runs both checks over a fresh snapshot of the ledger.
    pub async fn run(&self) -> Result<ImbalanceReport> {
        let entries = self.ledger_repo.find_all().await?;
        let accounts = self.account_repo.find_all().await?;
        let partners = self.partner_repo.find_all().await?;

        let groups = group_by_transaction(&entries);
        let transactions_scanned = groups.len();

        let mut unbalanced = Vec::new();
        for group in &groups {
            if !group.is_balanced(self.tolerance) {
                // excess_side is Some whenever the group is unbalanced.
                let excess = group.excess_side().unwrap_or(NormalSide::Debit);
                unbalanced.push(UnbalancedTransaction {
                    transaction_id: group.transaction_id.clone(),
                    debit_total: group.debit_total(),
                    credit_total: group.credit_total(),
                    imbalance: group.imbalance(),
                    excess,
                });
            }
        }

        let mut by_owner: HashMap<&str, Vec<LedgerEntry>> = HashMap::new();
        for entry in &entries {
            by_owner
                .entry(entry.account_id.as_str())
                .or_default()
                .push(entry.clone());
        }
        let empty: Vec<LedgerEntry> = Vec::new();

        let mut mismatches = Vec::new();
        for account in &accounts {
            let owned = by_owner.get(account.id.as_str()).unwrap_or(&empty);
            let derived = derive_balance(owned, account.normal_side());
            let delta = derived - account.balance;
            if delta.abs() > self.tolerance {
                mismatches.push(BalanceMismatch {
                    owner_kind: OwnerKind::Account,
                    owner_id: account.id.clone(),
                    owner_name: account.name.clone(),
                    stored: account.balance,
                    derived,
                    delta,
                });
            }
        }
        for partner in &partners {
            let owned = by_owner.get(partner.id.as_str()).unwrap_or(&empty);
            let derived = derive_balance(owned, partner.normal_side(&self.policy));
            let delta = derived - partner.balance;
            if delta.abs() > self.tolerance {
                mismatches.push(BalanceMismatch {
                    owner_kind: OwnerKind::Partner,
                    owner_id: partner.id.clone(),
                    owner_name: partner.name.clone(),
                    stored: partner.balance,
                    derived,
                    delta,
                });
            }
        }

        let global_debit: Decimal = entries.iter().map(|e| e.debit).sum();
        let global_credit: Decimal = entries.iter().map(|e| e.credit).sum();

        let report = ImbalanceReport {
            unbalanced,
            mismatches,
            transactions_scanned,
            global_debit,
            global_credit,
            global_net: global_debit - global_credit,
        };

        tracing::info!(
            transactions = report.transactions_scanned,
            unbalanced = report.unbalanced.len(),
            mismatches = report.mismatches.len(),
            global_net = %report.global_net,
            "imbalance audit finished"
        );
        Ok(report)
    }
}
