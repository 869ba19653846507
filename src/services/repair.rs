use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AccountRoles;
use crate::error::Result;
use crate::models::{LedgerEntry, NormalSide, SignPolicy, TransactionType};
use crate::repositories::{LedgerRepository, OriginalOpeningRepository, PartnerRepository};
use crate::services::grouping::{group_by_transaction, TransactionGroup};
use crate::services::scan::{DetectedIssue, ProductionIssueDetail};
use crate::store::{collections, Document, DocumentStore};

/// Progress of a repair run, reported after every committed batch.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FixProgress {
    /// Entries committed so far.
    pub current: usize,
    /// Entries planned in total.
    pub total: usize,
    /// 1-based index of the batch just attempted.
    pub batch: usize,
    pub batches: usize,
}

pub type ProgressSink = Arc<dyn Fn(FixProgress) + Send + Sync>;

#[derive(Default, Clone)]
pub struct FixOptions {
    /// Plan and validate everything but write nothing.
    pub dry_run: bool,
    pub on_progress: Option<ProgressSink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixError {
    pub entity_id: String,
    pub message: String,
}

/// Outcome of a repair run. `errors` is populated per failed batch; batches
/// after a failed one are still attempted, so a partial run commits what it
/// can.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixSummary {
    pub success: bool,
    pub message: String,
    pub fixed: usize,
    pub skipped: usize,
    pub entries_written: usize,
    pub dry_run: bool,
    pub errors: Vec<FixError>,
}

enum Plan {
    Post(Vec<LedgerEntry>),
    Skip,
    Fail(String),
}

/// Applies corrective postings for detected issues.
///
/// Every fix re-checks its precondition against a fresh ledger snapshot at
/// apply time, so replaying the same issue list is harmless: already-healthy
/// targets are skipped, not double-posted. Corrective entries always reuse
/// the broken group's transaction id and carry the adjustment marker.
pub struct RepairService {
    store: Arc<dyn DocumentStore>,
    ledger_repo: LedgerRepository,
    partner_repo: PartnerRepository,
    opening_repo: OriginalOpeningRepository,
    roles: AccountRoles,
    policy: SignPolicy,
    tolerance: Decimal,
}

impl RepairService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        roles: AccountRoles,
        policy: SignPolicy,
        tolerance: Decimal,
    ) -> Self {
        Self {
            ledger_repo: LedgerRepository::new(store.clone()),
            partner_repo: PartnerRepository::new(store.clone()),
            opening_repo: OriginalOpeningRepository::new(store.clone()),
            store,
            roles,
            policy,
            tolerance,
        }
    }

    pub async fn apply(
        &self,
        issues: &[DetectedIssue],
        options: &FixOptions,
    ) -> Result<FixSummary> {
        let entries = self.ledger_repo.find_all().await?;
        let mut groups: HashMap<String, TransactionGroup> = group_by_transaction(&entries)
            .into_iter()
            .map(|g| (g.transaction_id.clone(), g))
            .collect();
        let opening_dates: HashSet<NaiveDate> = self
            .opening_repo
            .find_all()
            .await?
            .iter()
            .map(|o| o.date)
            .collect();

        let mut summary = FixSummary {
            success: true,
            message: String::new(),
            fixed: 0,
            skipped: 0,
            entries_written: 0,
            dry_run: options.dry_run,
            errors: Vec::new(),
        };
        let mut planned: Vec<LedgerEntry> = Vec::new();
        let mut fix_spans: Vec<std::ops::Range<usize>> = Vec::new();

        for issue in issues {
            let plan = self.plan_fix(issue, &groups, &opening_dates).await?;
            match plan {
                Plan::Post(new_entries) => {
                    // Later plans must see earlier ones: overlapping findings
                    // for the same group (an orphan that is also a missing
                    // credit) would otherwise both post a fix.
                    for entry in &new_entries {
                        groups
                            .entry(entry.transaction_id.clone())
                            .or_insert_with(|| TransactionGroup {
                                transaction_id: entry.transaction_id.clone(),
                                entries: Vec::new(),
                            })
                            .entries
                            .push(entry.clone());
                    }
                    let start = planned.len();
                    planned.extend(new_entries);
                    fix_spans.push(start..planned.len());
                }
                Plan::Skip => summary.skipped += 1,
                Plan::Fail(message) => {
                    summary.success = false;
                    summary.errors.push(FixError {
                        entity_id: issue.entity_id().to_string(),
                        message,
                    });
                }
            }
        }

        if options.dry_run {
            summary.fixed = fix_spans.len();
        } else {
            let committed = self.commit(planned, options, &mut summary).await;
            summary.entries_written = committed.iter().filter(|c| **c).count();
            // An issue only counts as fixed once every entry it planned
            // landed; entries lost to a failed batch stay in errors[].
            summary.fixed = fix_spans
                .iter()
                .filter(|span| (*span).clone().all(|i| committed[i]))
                .count();
        }

        summary.message = format!(
            "{} issue(s) fixed, {} skipped, {} error(s){}",
            summary.fixed,
            summary.skipped,
            summary.errors.len(),
            if summary.dry_run { " (dry run)" } else { "" },
        );
        tracing::info!(
            fixed = summary.fixed,
            skipped = summary.skipped,
            written = summary.entries_written,
            errors = summary.errors.len(),
            dry_run = summary.dry_run,
            "repair run finished"
        );
        Ok(summary)
    }

    /// Commits planned entries in ceiling-sized batches. Batches commit
    /// sequentially and independently; a failed batch is recorded and the
    /// remaining batches still run. Returns a per-entry commit mask.
    async fn commit(
        &self,
        planned: Vec<LedgerEntry>,
        options: &FixOptions,
        summary: &mut FixSummary,
    ) -> Vec<bool> {
        let total = planned.len();
        let ceiling = self.store.max_batch_ops();
        let batches = total.div_ceil(ceiling.max(1));
        let mut committed = vec![false; total];
        let mut written = 0;

        for (index, chunk) in planned.chunks(ceiling).enumerate() {
            let offset = index * ceiling;
            let docs: Vec<Document> = match chunk
                .iter()
                .map(|e| Document::from_model(e.id.clone(), e))
                .collect()
            {
                Ok(docs) => docs,
                Err(err) => {
                    summary.success = false;
                    summary.errors.push(FixError {
                        entity_id: format!("batch-{}", index + 1),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            match self
                .store
                .append_batch(collections::LEDGER_ENTRIES, docs)
                .await
            {
                Ok(()) => {
                    written += chunk.len();
                    for slot in &mut committed[offset..offset + chunk.len()] {
                        *slot = true;
                    }
                }
                Err(err) => {
                    summary.success = false;
                    summary.errors.push(FixError {
                        entity_id: format!("batch-{}", index + 1),
                        message: err.to_string(),
                    });
                    tracing::warn!(batch = index + 1, error = %err, "repair batch failed");
                }
            }

            if let Some(sink) = &options.on_progress {
                sink(FixProgress {
                    current: written,
                    total,
                    batch: index + 1,
                    batches,
                });
            }
        }
        committed
    }

    async fn plan_fix(
        &self,
        issue: &DetectedIssue,
        groups: &HashMap<String, TransactionGroup>,
        opening_dates: &HashSet<NaiveDate>,
    ) -> Result<Plan> {
        match issue {
            DetectedIssue::UnbalancedTransaction { transaction_id, .. }
            | DetectedIssue::OrphanedTransaction { transaction_id, .. } => {
                Ok(self.plan_balancing_leg(transaction_id, groups))
            }
            DetectedIssue::MissingOpeningBalance { partner_id, .. } => {
                self.plan_opening_balance(partner_id, groups).await
            }
            DetectedIssue::MissingPurchasePosting {
                purchase_id,
                date,
                expected_value,
                ..
            } => Ok(self.plan_purchase_posting(purchase_id, *date, *expected_value, groups)),
            DetectedIssue::MissingProductionPosting {
                production_id,
                date,
                expected_value,
                detail,
            } => Ok(self.plan_production_posting(
                production_id,
                *date,
                *expected_value,
                detail,
                groups,
                opening_dates,
            )),
            DetectedIssue::MissingCogsPosting {
                invoice_id,
                date,
                expected_value,
            } => Ok(self.plan_cogs_posting(invoice_id, *date, *expected_value, groups)),
            // Report-only findings; a human decides.
            DetectedIssue::MissingOriginalOpening { .. }
            | DetectedIssue::DuplicatePostingEstimate { .. } => Ok(Plan::Skip),
        }
    }

    /// One synthetic leg on the deficient side, sized to the current
    /// imbalance. Purchase-opening groups missing their debit get a proper
    /// raw-inventory debit instead of a suspense posting.
    fn plan_balancing_leg(
        &self,
        transaction_id: &str,
        groups: &HashMap<String, TransactionGroup>,
    ) -> Plan {
        let Some(group) = groups.get(transaction_id) else {
            return Plan::Skip;
        };
        if group.is_balanced(self.tolerance) {
            return Plan::Skip;
        }

        let net = group.net();
        let amount = net.abs();
        let date = group.entries[0].date;
        let missing_side = if net > Decimal::ZERO {
            NormalSide::Credit
        } else {
            NormalSide::Debit
        };

        let target = if missing_side == NormalSide::Debit && transaction_id.starts_with("OB-PUR-")
        {
            &self.roles.inventory_raw
        } else {
            &self.roles.balance_adjustment
        };

        let narration = format!("Auto-balancing entry for {}", transaction_id);
        let entry = match missing_side {
            NormalSide::Debit => LedgerEntry::debit(
                transaction_id,
                date,
                TransactionType::Adjustment,
                &target.account_id,
                &target.account_name,
                amount,
            ),
            NormalSide::Credit => LedgerEntry::credit(
                transaction_id,
                date,
                TransactionType::Adjustment,
                &target.account_id,
                &target.account_name,
                amount,
            ),
        };
        Plan::Post(vec![entry.with_narration(narration).as_adjustment()])
    }

    /// Two legs under `OB-{partnerId}`: the partner on its normal side, the
    /// opening-equity account on the opposite side. A negative balance flips
    /// both legs.
    async fn plan_opening_balance(
        &self,
        partner_id: &str,
        groups: &HashMap<String, TransactionGroup>,
    ) -> Result<Plan> {
        let Some(partner) = self.partner_repo.find_by_id(partner_id).await? else {
            return Ok(Plan::Fail(format!("partner '{}' no longer exists", partner_id)));
        };
        let transaction_id = partner.opening_transaction_id();
        let already_posted = groups.get(&transaction_id).is_some_and(|g| {
            g.entries
                .iter()
                .any(|e| e.transaction_type == TransactionType::OpeningBalance)
        });
        if already_posted || partner.balance.is_zero() {
            return Ok(Plan::Skip);
        }

        let amount = partner.balance.abs();
        let date = partner.created_at.date_naive();
        let mut partner_side = partner.normal_side(&self.policy);
        if partner.balance < Decimal::ZERO {
            partner_side = match partner_side {
                NormalSide::Debit => NormalSide::Credit,
                NormalSide::Credit => NormalSide::Debit,
            };
        }

        let equity = &self.roles.opening_equity;
        let narration = format!("Opening balance for {}", partner.name);
        let (partner_leg, equity_leg) = match partner_side {
            NormalSide::Debit => (
                LedgerEntry::debit(
                    &transaction_id,
                    date,
                    TransactionType::OpeningBalance,
                    &partner.id,
                    &partner.name,
                    amount,
                ),
                LedgerEntry::credit(
                    &transaction_id,
                    date,
                    TransactionType::OpeningBalance,
                    &equity.account_id,
                    &equity.account_name,
                    amount,
                ),
            ),
            NormalSide::Credit => (
                LedgerEntry::credit(
                    &transaction_id,
                    date,
                    TransactionType::OpeningBalance,
                    &partner.id,
                    &partner.name,
                    amount,
                ),
                LedgerEntry::debit(
                    &transaction_id,
                    date,
                    TransactionType::OpeningBalance,
                    &equity.account_id,
                    &equity.account_name,
                    amount,
                ),
            ),
        };

        Ok(Plan::Post(vec![
            partner_leg.with_narration(&narration).as_adjustment(),
            equity_leg.with_narration(&narration).as_adjustment(),
        ]))
    }

    /// Raw-inventory debit against a capital credit under `OB-PUR-{id}`.
    fn plan_purchase_posting(
        &self,
        purchase_id: &str,
        date: NaiveDate,
        value: Decimal,
        groups: &HashMap<String, TransactionGroup>,
    ) -> Plan {
        let transaction_id = format!("OB-PUR-{}", purchase_id);
        if groups.contains_key(&transaction_id) || value <= Decimal::ZERO {
            return Plan::Skip;
        }

        let narration = format!("Opening stock from purchase {}", purchase_id);
        Plan::Post(vec![
            LedgerEntry::debit(
                &transaction_id,
                date,
                TransactionType::OpeningBalance,
                &self.roles.inventory_raw.account_id,
                &self.roles.inventory_raw.account_name,
                value,
            )
            .with_narration(&narration)
            .as_adjustment(),
            LedgerEntry::credit(
                &transaction_id,
                date,
                TransactionType::OpeningBalance,
                &self.roles.capital.account_id,
                &self.roles.capital.account_name,
                value,
            )
            .with_narration(&narration)
            .as_adjustment(),
        ])
    }

    /// Finished-goods debit against WIP when an opening exists for the date,
    /// production gain otherwise. Groups that only miss their credit get a
    /// single credit sized to the current shortfall.
    fn plan_production_posting(
        &self,
        production_id: &str,
        date: NaiveDate,
        value: Decimal,
        detail: &ProductionIssueDetail,
        groups: &HashMap<String, TransactionGroup>,
        opening_dates: &HashSet<NaiveDate>,
    ) -> Plan {
        let credit_target = if opening_dates.contains(&date) {
            &self.roles.wip
        } else {
            &self.roles.production_gain
        };
        let narration = format!("Production posting for {}", production_id);

        match detail {
            ProductionIssueDetail::NoEntries => {
                if groups.contains_key(production_id) || value <= Decimal::ZERO {
                    return Plan::Skip;
                }
                Plan::Post(vec![
                    LedgerEntry::debit(
                        production_id,
                        date,
                        TransactionType::Production,
                        &self.roles.inventory_finished_goods.account_id,
                        &self.roles.inventory_finished_goods.account_name,
                        value,
                    )
                    .with_narration(&narration)
                    .as_adjustment(),
                    LedgerEntry::credit(
                        production_id,
                        date,
                        TransactionType::Production,
                        &credit_target.account_id,
                        &credit_target.account_name,
                        value,
                    )
                    .with_narration(&narration)
                    .as_adjustment(),
                ])
            }
            ProductionIssueDetail::MissingCredit { .. } => {
                let Some(group) = groups.get(production_id) else {
                    return Plan::Skip;
                };
                let shortfall = group.debit_total() - group.credit_total();
                if shortfall <= self.tolerance {
                    return Plan::Skip;
                }
                Plan::Post(vec![LedgerEntry::credit(
                    production_id,
                    date,
                    TransactionType::Production,
                    &credit_target.account_id,
                    &credit_target.account_name,
                    shortfall,
                )
                .with_narration(&narration)
                .as_adjustment()])
            }
        }
    }

    /// COGS debit against a finished-goods inventory-reduction credit under
    /// the invoice's own transaction id.
    fn plan_cogs_posting(
        &self,
        invoice_id: &str,
        date: NaiveDate,
        value: Decimal,
        groups: &HashMap<String, TransactionGroup>,
    ) -> Plan {
        if value <= Decimal::ZERO {
            return Plan::Skip;
        }
        let covered = groups.get(invoice_id).is_some_and(|group| {
            let has_cogs_debit = group
                .entries
                .iter()
                .any(|e| e.account_id == self.roles.cogs.account_id && e.debit > Decimal::ZERO);
            let has_reduction = group.entries.iter().any(|e| {
                e.account_id == self.roles.inventory_finished_goods.account_id
                    && e.credit > Decimal::ZERO
                    && e.narration.to_lowercase().contains("inventory reduction")
            });
            has_cogs_debit && has_reduction
        });
        if covered {
            return Plan::Skip;
        }

        Plan::Post(vec![
            LedgerEntry::debit(
                invoice_id,
                date,
                TransactionType::SalesInvoice,
                &self.roles.cogs.account_id,
                &self.roles.cogs.account_name,
                value,
            )
            .with_narration(format!("COGS for sales invoice {}", invoice_id))
            .as_adjustment(),
            LedgerEntry::credit(
                invoice_id,
                date,
                TransactionType::SalesInvoice,
                &self.roles.inventory_finished_goods.account_id,
                &self.roles.inventory_finished_goods.account_name,
                value,
            )
            .with_narration(format!("Inventory reduction for sales invoice {}", invoice_id))
            .as_adjustment(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleSettings;
    use crate::models::{Account, AccountType, Partner, PartnerType};
    use crate::store::{FieldUpdate, MemoryStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Delegates to a MemoryStore but fails the Nth append call.
    struct FlakyStore {
        inner: MemoryStore,
        fail_on_append: usize,
        appends: AtomicUsize,
    }

    impl FlakyStore {
        fn new(ceiling: usize, fail_on_append: usize) -> Self {
            Self {
                inner: MemoryStore::with_batch_ceiling(ceiling),
                fail_on_append,
                appends: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn get_all(&self, collection: &str) -> StoreResult<Vec<Document>> {
            self.inner.get_all(collection).await
        }

        async fn query_by_field(
            &self,
            collection: &str,
            field: &str,
            value: &Value,
        ) -> StoreResult<Vec<Document>> {
            self.inner.query_by_field(collection, field, value).await
        }

        async fn append_batch(&self, collection: &str, docs: Vec<Document>) -> StoreResult<()> {
            let call = self.appends.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on_append {
                return Err(StoreError::Commit("transient write failure".to_string()));
            }
            self.inner.append_batch(collection, docs).await
        }

        async fn update_batch(
            &self,
            collection: &str,
            updates: Vec<FieldUpdate>,
        ) -> StoreResult<()> {
            self.inner.update_batch(collection, updates).await
        }

        async fn delete_batch(&self, collection: &str, ids: Vec<String>) -> StoreResult<()> {
            self.inner.delete_batch(collection, ids).await
        }

        fn max_batch_ops(&self) -> usize {
            self.inner.max_batch_ops()
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 15).unwrap()
    }

    fn chart() -> Vec<Account> {
        vec![
            Account::new("FG", "1100", "Inventory - Finished Goods", AccountType::Asset),
            Account::new("RAW", "1200", "Inventory - Raw Materials", AccountType::Asset),
            Account::new("WIP", "1300", "Work in Progress", AccountType::Asset),
            Account::new("COGS", "5000", "Cost of Goods Sold", AccountType::Expense),
            Account::new("CAP", "3000", "Capital", AccountType::Equity),
            Account::new("ADJ", "3900", "Balance Adjustment", AccountType::Equity),
            Account::new("GAIN", "3800", "Production Gain", AccountType::Equity),
        ]
    }

    fn service(store: Arc<MemoryStore>) -> RepairService {
        let roles = AccountRoles::resolve(&RoleSettings::default(), &chart()).unwrap();
        RepairService::new(store, roles, SignPolicy::default(), dec!(0.01))
    }

    async fn seed_entries(store: &Arc<MemoryStore>, entries: &[LedgerEntry]) {
        LedgerRepository::new(store.clone())
            .append(entries)
            .await
            .unwrap();
    }

    async fn group_of(store: &Arc<MemoryStore>, tx: &str) -> TransactionGroup {
        let entries = LedgerRepository::new(store.clone())
            .find_by_transaction(tx)
            .await
            .unwrap();
        TransactionGroup {
            transaction_id: tx.to_string(),
            entries,
        }
    }

    fn unbalanced(tx: &str) -> DetectedIssue {
        DetectedIssue::UnbalancedTransaction {
            transaction_id: tx.to_string(),
            imbalance: Decimal::ZERO,
            excess: NormalSide::Debit,
        }
    }

    #[tokio::test]
    async fn test_balancing_leg_and_idempotence() {
        let store = Arc::new(MemoryStore::new());
        seed_entries(
            &store,
            &[
                LedgerEntry::debit("T1", date(), TransactionType::JournalVoucher, "A", "A", dec!(100)),
                LedgerEntry::credit("T1", date(), TransactionType::JournalVoucher, "B", "B", dec!(40)),
            ],
        )
        .await;

        let repair = service(store.clone());
        let issues = vec![unbalanced("T1")];

        let summary = repair.apply(&issues, &FixOptions::default()).await.unwrap();
        assert!(summary.success);
        assert_eq!(summary.fixed, 1);
        assert_eq!(summary.entries_written, 1);

        let group = group_of(&store, "T1").await;
        assert!(group.is_balanced(dec!(0.01)));
        let leg = group.entries.iter().find(|e| e.is_adjustment).unwrap();
        assert_eq!(leg.credit, dec!(60));
        assert_eq!(leg.account_id, "ADJ");
        assert_eq!(leg.transaction_type, TransactionType::Adjustment);

        // The group is healthy now; replaying the same issue writes nothing.
        let second = repair.apply(&issues, &FixOptions::default()).await.unwrap();
        assert_eq!(second.fixed, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.entries_written, 0);
        assert_eq!(group_of(&store, "T1").await.entries.len(), 3);
    }

    #[tokio::test]
    async fn test_purchase_opening_group_gets_inventory_debit() {
        let store = Arc::new(MemoryStore::new());
        seed_entries(
            &store,
            &[LedgerEntry::credit(
                "OB-PUR-P1",
                date(),
                TransactionType::OpeningBalance,
                "CAP",
                "Capital",
                dec!(900),
            )],
        )
        .await;

        let repair = service(store.clone());
        repair
            .apply(&[unbalanced("OB-PUR-P1")], &FixOptions::default())
            .await
            .unwrap();

        let group = group_of(&store, "OB-PUR-P1").await;
        let leg = group.entries.iter().find(|e| e.is_adjustment).unwrap();
        // Known purchase-opening shape: the debit goes to raw inventory, not
        // to the suspense account.
        assert_eq!(leg.account_id, "RAW");
        assert_eq!(leg.debit, dec!(900));
    }

    #[tokio::test]
    async fn test_missing_opening_balance_sides() {
        let store = Arc::new(MemoryStore::new());
        let customer =
            Partner::new("CUS-007", "Acme", PartnerType::Customer).with_balance(dec!(1500));
        let supplier =
            Partner::new("SUP-002", "Steel Co", PartnerType::Supplier).with_balance(dec!(800));
        store
            .append_batch(
                crate::store::collections::PARTNERS,
                vec![
                    Document::from_model(customer.id.clone(), &customer).unwrap(),
                    Document::from_model(supplier.id.clone(), &supplier).unwrap(),
                ],
            )
            .await
            .unwrap();

        let repair = service(store.clone());
        let issues = vec![
            DetectedIssue::MissingOpeningBalance {
                partner_id: "CUS-007".to_string(),
                partner_name: "Acme".to_string(),
                balance: dec!(1500),
                date: date(),
            },
            DetectedIssue::MissingOpeningBalance {
                partner_id: "SUP-002".to_string(),
                partner_name: "Steel Co".to_string(),
                balance: dec!(800),
                date: date(),
            },
        ];
        let summary = repair.apply(&issues, &FixOptions::default()).await.unwrap();
        assert_eq!(summary.fixed, 2);
        assert_eq!(summary.entries_written, 4);

        // Debit-normal customer: partner debited, equity credited.
        let customer_group = group_of(&store, "OB-CUS-007").await;
        assert!(customer_group.is_balanced(dec!(0.01)));
        let partner_leg = customer_group
            .entries
            .iter()
            .find(|e| e.account_id == "CUS-007")
            .unwrap();
        assert_eq!(partner_leg.debit, dec!(1500));
        assert_eq!(partner_leg.transaction_type, TransactionType::OpeningBalance);

        // Credit-normal supplier: legs flipped.
        let supplier_group = group_of(&store, "OB-SUP-002").await;
        let partner_leg = supplier_group
            .entries
            .iter()
            .find(|e| e.account_id == "SUP-002")
            .unwrap();
        assert_eq!(partner_leg.credit, dec!(800));
    }

    #[tokio::test]
    async fn test_missing_purchase_and_production_postings() {
        let store = Arc::new(MemoryStore::new());
        let repair = service(store.clone());

        let issues = vec![
            DetectedIssue::MissingPurchasePosting {
                purchase_id: "P1".to_string(),
                supplier_id: "SUP-1".to_string(),
                date: date(),
                expected_value: dec!(4200),
            },
            // No original opening exists for the date: the credit must fall
            // back to the production-gain account.
            DetectedIssue::MissingProductionPosting {
                production_id: "PROD-X1".to_string(),
                date: date(),
                expected_value: dec!(500),
                detail: ProductionIssueDetail::NoEntries,
            },
        ];
        let summary = repair.apply(&issues, &FixOptions::default()).await.unwrap();
        assert_eq!(summary.fixed, 2);

        let purchase_group = group_of(&store, "OB-PUR-P1").await;
        assert!(purchase_group.is_balanced(dec!(0.01)));
        assert!(purchase_group
            .entries
            .iter()
            .any(|e| e.account_id == "RAW" && e.debit == dec!(4200)));
        assert!(purchase_group
            .entries
            .iter()
            .any(|e| e.account_id == "CAP" && e.credit == dec!(4200)));

        let production_group = group_of(&store, "PROD-X1").await;
        assert!(production_group
            .entries
            .iter()
            .any(|e| e.account_id == "FG" && e.debit == dec!(500)));
        assert!(production_group
            .entries
            .iter()
            .any(|e| e.account_id == "GAIN" && e.credit == dec!(500)));
    }

    #[tokio::test]
    async fn test_production_missing_credit_gets_single_shortfall_leg() {
        let store = Arc::new(MemoryStore::new());
        seed_entries(
            &store,
            &[
                LedgerEntry::debit("PROD-2", date(), TransactionType::Production, "FG", "FG", dec!(500)),
                LedgerEntry::credit("PROD-2", date(), TransactionType::Production, "X", "X", dec!(120)),
            ],
        )
        .await;

        let repair = service(store.clone());
        let issues = vec![DetectedIssue::MissingProductionPosting {
            production_id: "PROD-2".to_string(),
            date: date(),
            expected_value: dec!(380),
            detail: ProductionIssueDetail::MissingCredit {
                debit_total: dec!(500),
            },
        }];
        repair.apply(&issues, &FixOptions::default()).await.unwrap();

        let group = group_of(&store, "PROD-2").await;
        assert!(group.is_balanced(dec!(0.01)));
        let leg = group.entries.iter().find(|e| e.is_adjustment).unwrap();
        assert_eq!(leg.credit, dec!(380));
        assert_eq!(leg.account_id, "GAIN");
    }

    #[tokio::test]
    async fn test_missing_cogs_posting_creates_pair() {
        let store = Arc::new(MemoryStore::new());
        let repair = service(store.clone());
        let issues = vec![DetectedIssue::MissingCogsPosting {
            invoice_id: "SI-1".to_string(),
            date: date(),
            expected_value: dec!(200),
        }];
        repair.apply(&issues, &FixOptions::default()).await.unwrap();

        let group = group_of(&store, "SI-1").await;
        assert!(group.is_balanced(dec!(0.01)));
        let credit = group.entries.iter().find(|e| e.credit > Decimal::ZERO).unwrap();
        assert_eq!(credit.account_id, "FG");
        assert!(credit.narration.contains("Inventory reduction"));

        // Already covered now; a second pass skips.
        let second = repair.apply(&issues, &FixOptions::default()).await.unwrap();
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        seed_entries(
            &store,
            &[LedgerEntry::debit(
                "T1",
                date(),
                TransactionType::JournalVoucher,
                "A",
                "A",
                dec!(50),
            )],
        )
        .await;

        let repair = service(store.clone());
        let options = FixOptions {
            dry_run: true,
            ..FixOptions::default()
        };
        let summary = repair.apply(&[unbalanced("T1")], &options).await.unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.fixed, 1);
        assert_eq!(summary.entries_written, 0);
        assert_eq!(group_of(&store, "T1").await.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_batches_split_at_ceiling_with_progress() {
        // Ceiling of 2 forces the 6 planned entries into 3 batches.
        let store = Arc::new(MemoryStore::with_batch_ceiling(2));
        let repair = service(store.clone());

        let issues: Vec<DetectedIssue> = (0..3)
            .map(|i| DetectedIssue::MissingPurchasePosting {
                purchase_id: format!("P{}", i),
                supplier_id: "SUP-1".to_string(),
                date: date(),
                expected_value: dec!(100),
            })
            .collect();

        let batches_seen = Arc::new(AtomicUsize::new(0));
        let last_progress = Arc::new(std::sync::Mutex::new(None::<FixProgress>));
        let sink: ProgressSink = {
            let batches_seen = batches_seen.clone();
            let last_progress = last_progress.clone();
            Arc::new(move |p| {
                batches_seen.fetch_add(1, Ordering::SeqCst);
                *last_progress.lock().unwrap() = Some(p);
            })
        };

        let summary = repair
            .apply(
                &issues,
                &FixOptions {
                    dry_run: false,
                    on_progress: Some(sink),
                },
            )
            .await
            .unwrap();

        assert!(summary.success);
        assert_eq!(summary.entries_written, 6);
        assert_eq!(batches_seen.load(Ordering::SeqCst), 3);
        let final_progress = last_progress.lock().unwrap().unwrap();
        assert_eq!(final_progress.current, final_progress.total);
        assert_eq!(final_progress.batches, 3);
    }

    #[tokio::test]
    async fn test_failed_batch_excludes_its_issues_from_fixed() {
        // Ceiling 2 puts each purchase pair in its own batch; the second
        // batch fails, so its issue must not be reported as fixed.
        let store = Arc::new(FlakyStore::new(2, 2));
        let roles = AccountRoles::resolve(&RoleSettings::default(), &chart()).unwrap();
        let repair = RepairService::new(store.clone(), roles, SignPolicy::default(), dec!(0.01));

        let issues: Vec<DetectedIssue> = (0..3)
            .map(|i| DetectedIssue::MissingPurchasePosting {
                purchase_id: format!("P{}", i),
                supplier_id: "SUP-1".to_string(),
                date: date(),
                expected_value: dec!(100),
            })
            .collect();

        let summary = repair.apply(&issues, &FixOptions::default()).await.unwrap();
        assert!(!summary.success);
        assert_eq!(summary.fixed, 2);
        assert_eq!(summary.entries_written, 4);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].entity_id, "batch-2");

        let remaining = store
            .get_all(collections::LEDGER_ENTRIES)
            .await
            .unwrap()
            .len();
        assert_eq!(remaining, 4);
    }

    #[tokio::test]
    async fn test_report_only_issues_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let repair = service(store.clone());
        let issues = vec![
            DetectedIssue::DuplicatePostingEstimate {
                transaction_id: "SI-DUP".to_string(),
                entry_count: 18,
                estimated_duplicates: 3,
            },
            DetectedIssue::MissingOriginalOpening {
                production_id: "PROD-9".to_string(),
                date: date(),
                expected_value: dec!(100),
            },
        ];

        let summary = repair.apply(&issues, &FixOptions::default()).await.unwrap();
        assert_eq!(summary.fixed, 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.entries_written, 0);
    }

    #[tokio::test]
    async fn test_vanished_partner_is_an_error_not_a_panic() {
        let store = Arc::new(MemoryStore::new());
        let repair = service(store.clone());
        let issues = vec![DetectedIssue::MissingOpeningBalance {
            partner_id: "GHOST".to_string(),
            partner_name: "Ghost".to_string(),
            balance: dec!(10),
            date: date(),
        }];

        let summary = repair.apply(&issues, &FixOptions::default()).await.unwrap();
        assert!(!summary.success);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].entity_id, "GHOST");
    }
}
