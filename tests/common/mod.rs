#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use recon_engine::config::{AccountRoles, RoleSettings};
use recon_engine::models::{
    Account, AccountType, LedgerEntry, Partner, PartnerType, TransactionType,
};
use recon_engine::store::{collections, Document, DocumentStore, MemoryStore};
use rust_decimal::Decimal;

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
}

/// A small factory chart of accounts covering every role the engine resolves.
pub fn chart() -> Vec<Account> {
    vec![
        Account::new("ACC-FG", "1100", "Inventory - Finished Goods", AccountType::Asset),
        Account::new("ACC-RAW", "1200", "Inventory - Raw Materials", AccountType::Asset),
        Account::new("ACC-WIP", "1300", "Work in Progress", AccountType::Asset),
        Account::new("ACC-COGS", "5000", "Cost of Goods Sold", AccountType::Expense),
        Account::new("ACC-CAP", "3000", "Capital", AccountType::Equity),
        Account::new("ACC-ADJ", "3900", "Balance Adjustment", AccountType::Equity),
        Account::new("ACC-GAIN", "3800", "Production Gain", AccountType::Equity),
        Account::new("ACC-REV", "4000", "Sales Revenue", AccountType::Revenue),
    ]
}

/// Seeds a fresh in-memory store with the chart and resolves the roles.
pub async fn seeded_store() -> (Arc<MemoryStore>, AccountRoles) {
    seeded_store_with_ceiling(recon_engine::store::memory::DEFAULT_BATCH_CEILING).await
}

pub async fn seeded_store_with_ceiling(ceiling: usize) -> (Arc<MemoryStore>, AccountRoles) {
    let store = Arc::new(MemoryStore::with_batch_ceiling(ceiling));
    let accounts = chart();
    for chunk in accounts.chunks(ceiling) {
        let docs = chunk
            .iter()
            .map(|a| Document::from_model(a.id.clone(), a).unwrap())
            .collect();
        store
            .append_batch(collections::ACCOUNTS, docs)
            .await
            .unwrap();
    }
    let roles = AccountRoles::resolve(&RoleSettings::default(), &accounts).unwrap();
    (store, roles)
}

pub async fn seed_partner(store: &Arc<MemoryStore>, partner: &Partner) {
    store
        .append_batch(
            collections::PARTNERS,
            vec![Document::from_model(partner.id.clone(), partner).unwrap()],
        )
        .await
        .unwrap();
}

pub fn customer(id: &str, name: &str, balance: Decimal) -> Partner {
    Partner::new(id, name, PartnerType::Customer).with_balance(balance)
}

pub fn debit(tx: &str, account: &str, amount: Decimal) -> LedgerEntry {
    LedgerEntry::debit(tx, date(), TransactionType::JournalVoucher, account, account, amount)
}

pub fn credit(tx: &str, account: &str, amount: Decimal) -> LedgerEntry {
    LedgerEntry::credit(tx, date(), TransactionType::JournalVoucher, account, account, amount)
}
