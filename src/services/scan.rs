use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AccountRoles;
use crate::error::Result;
use crate::models::{NormalSide, TransactionType};
use crate::repositories::{
    LedgerRepository, OriginalOpeningRepository, PartnerRepository, ProductionRepository,
    PurchaseRepository, SalesInvoiceRepository,
};
use crate::services::audit::UnbalancedTransaction;
use crate::services::grouping::{group_by_transaction, TransactionGroup};
use crate::store::DocumentStore;

/// Groups with more entries than this are suspected duplicate postings.
const DUPLICATE_SUSPECT_THRESHOLD: usize = 12;
/// A normal invoice posting carries about six legs; the duplicate estimate
/// divides by this. Best-effort only, never acted on automatically.
const ENTRIES_PER_POSTING: usize = 6;

/// What exactly is wrong with a production's ledger group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "case", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionIssueDetail {
    /// No ledger entries at all.
    NoEntries,
    /// Finished-goods debit present but neither a WIP credit nor a
    /// production-gain/capital credit.
    MissingCredit { debit_total: Decimal },
}

/// One finding from the domain scans. Exhaustively tagged so the repair
/// service can pattern-match on the kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectedIssue {
    UnbalancedTransaction {
        transaction_id: String,
        imbalance: Decimal,
        excess: NormalSide,
    },
    /// Entries on only one side of a group; always an error.
    OrphanedTransaction {
        transaction_id: String,
        side: NormalSide,
        total: Decimal,
    },
    MissingOpeningBalance {
        partner_id: String,
        partner_name: String,
        balance: Decimal,
        date: NaiveDate,
    },
    MissingPurchasePosting {
        purchase_id: String,
        supplier_id: String,
        date: NaiveDate,
        expected_value: Decimal,
    },
    MissingProductionPosting {
        production_id: String,
        date: NaiveDate,
        expected_value: Decimal,
        detail: ProductionIssueDetail,
    },
    /// Production consumed raw material that was never formally opened;
    /// reported for manual review, never auto-fixed.
    MissingOriginalOpening {
        production_id: String,
        date: NaiveDate,
        expected_value: Decimal,
    },
    MissingCogsPosting {
        invoice_id: String,
        date: NaiveDate,
        expected_value: Decimal,
    },
    /// Heuristic estimate, surfaced as such; never auto-fixed.
    DuplicatePostingEstimate {
        transaction_id: String,
        entry_count: usize,
        estimated_duplicates: usize,
    },
}

impl DetectedIssue {
    /// The document or group this finding is about.
    pub fn entity_id(&self) -> &str {
        match self {
            DetectedIssue::UnbalancedTransaction { transaction_id, .. }
            | DetectedIssue::OrphanedTransaction { transaction_id, .. }
            | DetectedIssue::DuplicatePostingEstimate { transaction_id, .. } => transaction_id,
            DetectedIssue::MissingOpeningBalance { partner_id, .. } => partner_id,
            DetectedIssue::MissingPurchasePosting { purchase_id, .. } => purchase_id,
            DetectedIssue::MissingProductionPosting { production_id, .. }
            | DetectedIssue::MissingOriginalOpening { production_id, .. } => production_id,
            DetectedIssue::MissingCogsPosting { invoice_id, .. } => invoice_id,
        }
    }

    /// Document date of the finding, when it has one. Group-level findings
    /// carry no date of their own.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DetectedIssue::MissingOpeningBalance { date, .. }
            | DetectedIssue::MissingPurchasePosting { date, .. }
            | DetectedIssue::MissingProductionPosting { date, .. }
            | DetectedIssue::MissingOriginalOpening { date, .. }
            | DetectedIssue::MissingCogsPosting { date, .. } => Some(*date),
            DetectedIssue::UnbalancedTransaction { .. }
            | DetectedIssue::OrphanedTransaction { .. }
            | DetectedIssue::DuplicatePostingEstimate { .. } => None,
        }
    }

    /// The amount a corrective posting would carry, when one can be sized.
    pub fn expected_value(&self) -> Option<Decimal> {
        match self {
            DetectedIssue::UnbalancedTransaction { imbalance, .. } => Some(*imbalance),
            DetectedIssue::OrphanedTransaction { total, .. } => Some(*total),
            DetectedIssue::MissingOpeningBalance { balance, .. } => Some(balance.abs()),
            DetectedIssue::MissingPurchasePosting { expected_value, .. }
            | DetectedIssue::MissingProductionPosting { expected_value, .. }
            | DetectedIssue::MissingOriginalOpening { expected_value, .. }
            | DetectedIssue::MissingCogsPosting { expected_value, .. } => Some(*expected_value),
            DetectedIssue::DuplicatePostingEstimate { .. } => None,
        }
    }

    /// Human-readable description for operator reports.
    pub fn reason(&self) -> String {
        match self {
            DetectedIssue::UnbalancedTransaction {
                imbalance, excess, ..
            } => {
                let side = match excess {
                    NormalSide::Debit => "debit",
                    NormalSide::Credit => "credit",
                };
                format!("transaction has excess {} of {}", side, imbalance)
            }
            DetectedIssue::OrphanedTransaction { side, total, .. } => {
                let (present, missing) = match side {
                    NormalSide::Debit => ("debit", "credit"),
                    NormalSide::Credit => ("credit", "debit"),
                };
                format!("Missing {} entry: group has only {} legs totalling {}", missing, present, total)
            }
            DetectedIssue::MissingOpeningBalance {
                partner_name,
                balance,
                ..
            } => format!(
                "partner '{}' carries balance {} but has no opening-balance group",
                partner_name, balance
            ),
            DetectedIssue::MissingPurchasePosting { expected_value, .. } => format!(
                "purchase with landed cost {} has no inventory/capital posting",
                expected_value
            ),
            DetectedIssue::MissingProductionPosting { detail, .. } => match detail {
                ProductionIssueDetail::NoEntries => "production has no ledger entries".to_string(),
                ProductionIssueDetail::MissingCredit { debit_total } => format!(
                    "production has a finished-goods debit of {} but no WIP or gain credit",
                    debit_total
                ),
            },
            DetectedIssue::MissingOriginalOpening { date, .. } => format!(
                "no original opening recorded for production date {}",
                date
            ),
            DetectedIssue::MissingCogsPosting { expected_value, .. } => format!(
                "posted invoice lacks COGS/inventory-reduction legs worth {}",
                expected_value
            ),
            DetectedIssue::DuplicatePostingEstimate {
                entry_count,
                estimated_duplicates,
                ..
            } => format!(
                "group carries {} entries, roughly {} duplicate postings (estimate only)",
                entry_count, estimated_duplicates
            ),
        }
    }

    /// Whether the repair service is allowed to synthesize a fix for this
    /// kind. Estimates and missing openings of raw material need a human.
    pub fn is_auto_fixable(&self) -> bool {
        !matches!(
            self,
            DetectedIssue::DuplicatePostingEstimate { .. }
                | DetectedIssue::MissingOriginalOpening { .. }
        )
    }
}

impl From<&UnbalancedTransaction> for DetectedIssue {
    fn from(u: &UnbalancedTransaction) -> Self {
        DetectedIssue::UnbalancedTransaction {
            transaction_id: u.transaction_id.clone(),
            imbalance: u.imbalance,
            excess: u.excess,
        }
    }
}

/// Domain-specific scans for postings the normal document flow should have
/// created but did not. Each scan is independent; `run_all` composes them.
///
/// Detectors never fail on a malformed record; ambiguous records are skipped
/// and logged.
pub struct ScanService {
    ledger_repo: LedgerRepository,
    partner_repo: PartnerRepository,
    purchase_repo: PurchaseRepository,
    invoice_repo: SalesInvoiceRepository,
    production_repo: ProductionRepository,
    opening_repo: OriginalOpeningRepository,
    roles: AccountRoles,
}

impl ScanService {
    pub fn new(store: Arc<dyn DocumentStore>, roles: AccountRoles) -> Self {
        Self {
            ledger_repo: LedgerRepository::new(store.clone()),
            partner_repo: PartnerRepository::new(store.clone()),
            purchase_repo: PurchaseRepository::new(store.clone()),
            invoice_repo: SalesInvoiceRepository::new(store.clone()),
            production_repo: ProductionRepository::new(store.clone()),
            opening_repo: OriginalOpeningRepository::new(store),
            roles,
        }
    }

    pub async fn run_all(&self) -> Result<Vec<DetectedIssue>> {
        let mut issues = Vec::new();
        issues.extend(self.missing_opening_balances().await?);
        issues.extend(self.missing_purchase_postings().await?);
        issues.extend(self.missing_production_postings().await?);
        issues.extend(self.missing_cogs_postings().await?);
        issues.extend(self.orphaned_transactions().await?);
        issues.extend(self.duplicate_posting_estimates().await?);
        tracing::info!(issues = issues.len(), "missing-posting scan finished");
        Ok(issues)
    }

    /// Partners with a nonzero balance but no `OB-{partnerId}` group of type
    /// OPENING_BALANCE.
    pub async fn missing_opening_balances(&self) -> Result<Vec<DetectedIssue>> {
        let partners = self.partner_repo.find_all().await?;
        let entries = self.ledger_repo.find_all().await?;

        let opening_groups: HashSet<&str> = entries
            .iter()
            .filter(|e| e.transaction_type == TransactionType::OpeningBalance)
            .map(|e| e.transaction_id.as_str())
            .collect();

        Ok(partners
            .iter()
            .filter(|p| !p.balance.is_zero())
            .filter(|p| !opening_groups.contains(p.opening_transaction_id().as_str()))
            .map(|p| DetectedIssue::MissingOpeningBalance {
                partner_id: p.id.clone(),
                partner_name: p.name.clone(),
                balance: p.balance,
                date: p.created_at.date_naive(),
            })
            .collect())
    }

    /// Purchases with positive landed cost but no `OB-PUR-{purchaseId}` group.
    pub async fn missing_purchase_postings(&self) -> Result<Vec<DetectedIssue>> {
        let purchases = self.purchase_repo.find_all().await?;
        let entries = self.ledger_repo.find_all().await?;
        let group_ids: HashSet<&str> =
            entries.iter().map(|e| e.transaction_id.as_str()).collect();

        Ok(purchases
            .iter()
            .filter(|p| p.landed_cost > Decimal::ZERO)
            .filter(|p| !group_ids.contains(p.posting_transaction_id().as_str()))
            .map(|p| DetectedIssue::MissingPurchasePosting {
                purchase_id: p.id.clone(),
                supplier_id: p.supplier_id.clone(),
                date: p.date,
                expected_value: p.landed_cost,
            })
            .collect())
    }

    /// Productions with output but missing or uncredited ledger groups, plus
    /// the secondary original-opening presence check.
    pub async fn missing_production_postings(&self) -> Result<Vec<DetectedIssue>> {
        let productions = self.production_repo.find_all().await?;
        let openings = self.opening_repo.find_all().await?;
        let entries = self.ledger_repo.find_all().await?;

        let groups: HashMap<String, TransactionGroup> = group_by_transaction(&entries)
            .into_iter()
            .map(|g| (g.transaction_id.clone(), g))
            .collect();
        let opening_dates: HashSet<NaiveDate> = openings.iter().map(|o| o.date).collect();

        let mut issues = Vec::new();
        for production in productions
            .iter()
            .filter(|p| p.qty_produced > Decimal::ZERO)
        {
            match groups.get(production.id.as_str()) {
                None => issues.push(DetectedIssue::MissingProductionPosting {
                    production_id: production.id.clone(),
                    date: production.date,
                    expected_value: production.expected_value(),
                    detail: ProductionIssueDetail::NoEntries,
                }),
                Some(group) => {
                    let has_fg_debit = group.entries.iter().any(|e| {
                        e.account_id == self.roles.inventory_finished_goods.account_id
                            && e.debit > Decimal::ZERO
                    });
                    let credit_covered = group.entries.iter().any(|e| {
                        e.credit > Decimal::ZERO
                            && (e.account_id == self.roles.wip.account_id
                                || e.account_id == self.roles.production_gain.account_id
                                || e.account_id == self.roles.capital.account_id)
                    });
                    if has_fg_debit && !credit_covered {
                        let needed = group.debit_total() - group.credit_total();
                        if needed > Decimal::ZERO {
                            issues.push(DetectedIssue::MissingProductionPosting {
                                production_id: production.id.clone(),
                                date: production.date,
                                expected_value: needed,
                                detail: ProductionIssueDetail::MissingCredit {
                                    debit_total: group.debit_total(),
                                },
                            });
                        }
                    }
                }
            }

            if !opening_dates.contains(&production.date) {
                issues.push(DetectedIssue::MissingOriginalOpening {
                    production_id: production.id.clone(),
                    date: production.date,
                    expected_value: production.expected_value(),
                });
            }
        }
        Ok(issues)
    }

    /// Posted sales invoices with item lines but no COGS debit paired with an
    /// inventory-reduction credit in their group.
    pub async fn missing_cogs_postings(&self) -> Result<Vec<DetectedIssue>> {
        let invoices = self.invoice_repo.find_all().await?;
        let entries = self.ledger_repo.find_all().await?;
        let groups: HashMap<String, TransactionGroup> = group_by_transaction(&entries)
            .into_iter()
            .map(|g| (g.transaction_id.clone(), g))
            .collect();

        let mut issues = Vec::new();
        for invoice in invoices
            .iter()
            .filter(|i| i.is_posted() && i.has_item_lines())
        {
            let expected = invoice.cogs_value();
            if expected.is_zero() {
                // No cost information on any line; nothing to size a fix by.
                tracing::debug!(invoice_id = %invoice.id, "skipping invoice without cost data");
                continue;
            }

            let covered = groups.get(invoice.id.as_str()).is_some_and(|group| {
                let has_cogs_debit = group.entries.iter().any(|e| {
                    e.account_id == self.roles.cogs.account_id && e.debit > Decimal::ZERO
                });
                let has_inventory_reduction = group.entries.iter().any(|e| {
                    e.account_id == self.roles.inventory_finished_goods.account_id
                        && e.credit > Decimal::ZERO
                        && e.narration.to_lowercase().contains("inventory reduction")
                });
                has_cogs_debit && has_inventory_reduction
            });

            if !covered {
                issues.push(DetectedIssue::MissingCogsPosting {
                    invoice_id: invoice.id.clone(),
                    date: invoice.date,
                    expected_value: expected,
                });
            }
        }
        Ok(issues)
    }

    /// Groups with entries on only one side.
    pub async fn orphaned_transactions(&self) -> Result<Vec<DetectedIssue>> {
        let entries = self.ledger_repo.find_all().await?;
        Ok(group_by_transaction(&entries)
            .iter()
            .filter_map(|group| {
                group.one_sided().map(|side| DetectedIssue::OrphanedTransaction {
                    transaction_id: group.transaction_id.clone(),
                    side,
                    total: group.debit_total().max(group.credit_total()),
                })
            })
            .collect())
    }

    /// Groups large enough to suggest the same document was posted several
    /// times. The count is a guess, not a verified reconstruction.
    pub async fn duplicate_posting_estimates(&self) -> Result<Vec<DetectedIssue>> {
        let entries = self.ledger_repo.find_all().await?;
        Ok(group_by_transaction(&entries)
            .iter()
            .filter(|g| g.entries.len() > DUPLICATE_SUSPECT_THRESHOLD)
            .map(|g| DetectedIssue::DuplicatePostingEstimate {
                transaction_id: g.transaction_id.clone(),
                entry_count: g.entries.len(),
                estimated_duplicates: g.entries.len() / ENTRIES_PER_POSTING,
            })
            .collect())
    }
}
