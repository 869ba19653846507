use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the ledger increases an owner's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalSide {
    Debit,
    Credit,
}

/// Chart-of-accounts node types.
/// Each type has a "normal balance" side that determines how debits and
/// credits affect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Resources owned. Debits increase, credits decrease.
    Asset,
    /// Amounts owed. Credits increase, debits decrease.
    Liability,
    /// Owner's stake. Credits increase, debits decrease.
    Equity,
    /// Income earned. Credits increase, debits decrease.
    Revenue,
    /// Costs incurred. Debits increase, credits decrease.
    Expense,
}

impl AccountType {
    pub fn normal_side(&self) -> NormalSide {
        match self {
            AccountType::Asset | AccountType::Expense => NormalSide::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                NormalSide::Credit
            }
        }
    }

    pub fn is_debit_normal(&self) -> bool {
        self.normal_side() == NormalSide::Debit
    }
}

/// A chart-of-accounts node.
///
/// `balance` is a cached scalar; the contract is that it always equals the
/// value derived from the account's full ledger history. The reconciliation
/// engine overwrites it wholesale from a re-derivation, never increments it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub factory_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            code: code.into(),
            name: name.into(),
            account_type,
            balance: Decimal::ZERO,
            factory_id: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn normal_side(&self) -> NormalSide {
        self.account_type.normal_side()
    }
}
