use chrono::NaiveDate;
use proptest::prelude::*;
use recon_engine::models::{LedgerEntry, NormalSide, TransactionType};
use recon_engine::services::{derive_balance, group_by_transaction};
use rust_decimal::Decimal;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
}

fn entry(tx: &str, debit_cents: i64, credit_cents: i64) -> LedgerEntry {
    if credit_cents > 0 {
        LedgerEntry::credit(
            tx,
            date(),
            TransactionType::JournalVoucher,
            "A",
            "A",
            Decimal::new(credit_cents, 2),
        )
    } else {
        LedgerEntry::debit(
            tx,
            date(),
            TransactionType::JournalVoucher,
            "A",
            "A",
            Decimal::new(debit_cents, 2),
        )
    }
}

/// One leg: cents amount plus which side it posts to.
fn leg_strategy() -> impl Strategy<Value = (i64, bool)> {
    (0..1_000_000_000i64, any::<bool>())
}

proptest! {
    /// The two sign conventions are exact mirrors for any ledger history.
    #[test]
    fn derivation_sides_mirror(legs in proptest::collection::vec(leg_strategy(), 0..40)) {
        let entries: Vec<LedgerEntry> = legs
            .iter()
            .map(|(cents, is_credit)| {
                if *is_credit { entry("T", 0, (*cents).max(1)) } else { entry("T", *cents, 0) }
            })
            .collect();

        let debit_view = derive_balance(&entries, NormalSide::Debit);
        let credit_view = derive_balance(&entries, NormalSide::Credit);
        prop_assert_eq!(debit_view, -credit_view);
    }

    /// A ledger built entirely from mirrored debit/credit pairs always audits
    /// clean: every group balances exactly and the global net is zero.
    #[test]
    fn mirrored_pairs_always_balance(
        amounts in proptest::collection::vec(1..1_000_000_000i64, 1..30),
        group_count in 1..6usize,
    ) {
        let mut entries = Vec::new();
        for (i, cents) in amounts.iter().enumerate() {
            let tx = format!("T{}", i % group_count);
            entries.push(entry(&tx, *cents, 0));
            entries.push(entry(&tx, 0, *cents));
        }

        let groups = group_by_transaction(&entries);
        for group in &groups {
            prop_assert!(group.is_balanced(Decimal::ZERO));
            prop_assert_eq!(group.imbalance(), Decimal::ZERO);
            prop_assert!(group.one_sided().is_none());
        }

        let net: Decimal = entries.iter().map(LedgerEntry::signed_amount).sum();
        prop_assert_eq!(net, Decimal::ZERO);
    }

    /// Grouping partitions the input: entry counts are preserved and every
    /// entry lands in the group bearing its own transaction id.
    #[test]
    fn grouping_is_a_partition(
        legs in proptest::collection::vec((leg_strategy(), 0..5usize), 0..60),
    ) {
        let entries: Vec<LedgerEntry> = legs
            .iter()
            .map(|((cents, is_credit), tx)| {
                let tx = format!("T{}", tx);
                if *is_credit { entry(&tx, 0, (*cents).max(1)) } else { entry(&tx, *cents, 0) }
            })
            .collect();

        let groups = group_by_transaction(&entries);
        let regrouped: usize = groups.iter().map(|g| g.entries.len()).sum();
        prop_assert_eq!(regrouped, entries.len());
        for group in &groups {
            for entry in &group.entries {
                prop_assert_eq!(&entry.transaction_id, &group.transaction_id);
            }
        }
    }

    /// The group imbalance equals the absolute difference of the totals, and
    /// the excess side follows the sign of the net.
    #[test]
    fn imbalance_matches_totals(legs in proptest::collection::vec(leg_strategy(), 1..30)) {
        let entries: Vec<LedgerEntry> = legs
            .iter()
            .map(|(cents, is_credit)| {
                if *is_credit { entry("T", 0, (*cents).max(1)) } else { entry("T", *cents, 0) }
            })
            .collect();

        let groups = group_by_transaction(&entries);
        let group = &groups[0];
        let net = group.debit_total() - group.credit_total();
        prop_assert_eq!(group.imbalance(), net.abs());
        match group.excess_side() {
            Some(NormalSide::Debit) => prop_assert!(net > Decimal::ZERO),
            Some(NormalSide::Credit) => prop_assert!(net < Decimal::ZERO),
            None => prop_assert_eq!(net, Decimal::ZERO),
        }
    }
}
