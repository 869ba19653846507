use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::{LedgerEntry, NormalSide};

/// All ledger entries sharing one transaction id. Must balance: the sum of
/// debits equals the sum of credits within tolerance.
#[derive(Debug, Clone)]
pub struct TransactionGroup {
    pub transaction_id: String,
    pub entries: Vec<LedgerEntry>,
}

impl TransactionGroup {
    pub fn debit_total(&self) -> Decimal {
        self.entries.iter().map(|e| e.debit).sum()
    }

    pub fn credit_total(&self) -> Decimal {
        self.entries.iter().map(|e| e.credit).sum()
    }

    /// Signed net: positive means excess debit, negative excess credit.
    pub fn net(&self) -> Decimal {
        self.debit_total() - self.credit_total()
    }

    /// Absolute imbalance.
    pub fn imbalance(&self) -> Decimal {
        self.net().abs()
    }

    pub fn is_balanced(&self, tolerance: Decimal) -> bool {
        self.imbalance() <= tolerance
    }

    /// Which side carries the excess, when unbalanced.
    pub fn excess_side(&self) -> Option<NormalSide> {
        let net = self.net();
        if net.is_zero() {
            None
        } else if net > Decimal::ZERO {
            Some(NormalSide::Debit)
        } else {
            Some(NormalSide::Credit)
        }
    }

    /// A group with amounts on only one side is always an error, regardless
    /// of size.
    pub fn one_sided(&self) -> Option<NormalSide> {
        let debit = self.debit_total();
        let credit = self.credit_total();
        if debit > Decimal::ZERO && credit.is_zero() {
            Some(NormalSide::Debit)
        } else if credit > Decimal::ZERO && debit.is_zero() {
            Some(NormalSide::Credit)
        } else {
            None
        }
    }
}

/// Groups entries by transaction id. Groups appear in first-seen order and
/// entries keep their input order within each group; no sorting is applied.
pub fn group_by_transaction(entries: &[LedgerEntry]) -> Vec<TransactionGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<TransactionGroup> = Vec::new();

    for entry in entries {
        match index.get(entry.transaction_id.as_str()) {
            Some(&i) => groups[i].entries.push(entry.clone()),
            None => {
                index.insert(entry.transaction_id.as_str(), groups.len());
                groups.push(TransactionGroup {
                    transaction_id: entry.transaction_id.clone(),
                    entries: vec![entry.clone()],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()
    }

    fn debit(tx: &str, amount: Decimal) -> LedgerEntry {
        LedgerEntry::debit(tx, date(), TransactionType::JournalVoucher, "A", "A", amount)
    }

    fn credit(tx: &str, amount: Decimal) -> LedgerEntry {
        LedgerEntry::credit(tx, date(), TransactionType::JournalVoucher, "B", "B", amount)
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let entries = vec![
            debit("T2", dec!(5)),
            debit("T1", dec!(10)),
            credit("T2", dec!(5)),
            credit("T1", dec!(10)),
        ];

        let groups = group_by_transaction(&entries);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].transaction_id, "T2");
        assert_eq!(groups[1].transaction_id, "T1");
        assert_eq!(groups[0].entries.len(), 2);
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let entries = vec![debit("T1", dec!(1)), debit("T1", dec!(2)), credit("T1", dec!(3))];
        let groups = group_by_transaction(&entries);
        assert_eq!(groups[0].entries[0].debit, dec!(1));
        assert_eq!(groups[0].entries[1].debit, dec!(2));
        assert_eq!(groups[0].entries[2].credit, dec!(3));
    }

    #[test]
    fn test_totals_and_imbalance() {
        let groups = group_by_transaction(&[
            debit("T1", dec!(100)),
            credit("T1", dec!(30)),
        ]);
        let group = &groups[0];

        assert_eq!(group.debit_total(), dec!(100));
        assert_eq!(group.credit_total(), dec!(30));
        assert_eq!(group.net(), dec!(70));
        assert_eq!(group.imbalance(), dec!(70));
        assert_eq!(group.excess_side(), Some(NormalSide::Debit));
        assert!(!group.is_balanced(dec!(0.01)));
    }

    #[test]
    fn test_balanced_within_tolerance() {
        let groups = group_by_transaction(&[
            debit("T1", dec!(100.004)),
            credit("T1", dec!(100)),
        ]);
        assert!(groups[0].is_balanced(dec!(0.01)));
    }

    #[test]
    fn test_one_sided_detection() {
        let orphan = group_by_transaction(&[debit("T1", dec!(500))]);
        assert_eq!(orphan[0].one_sided(), Some(NormalSide::Debit));

        let paired = group_by_transaction(&[debit("T2", dec!(1)), credit("T2", dec!(2))]);
        assert_eq!(paired[0].one_sided(), None);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_by_transaction(&[]).is_empty());
    }
}
