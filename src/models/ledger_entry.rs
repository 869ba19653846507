use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The economic event a ledger entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    OpeningBalance,
    SalesInvoice,
    PurchaseInvoice,
    Production,
    JournalVoucher,
    Adjustment,
}

/// One leg of a double-entry posting. Entries are grouped by `transaction_id`;
/// the sum of debits must equal the sum of credits within each group.
///
/// Entries are append-only: created by posting a transaction, never updated in
/// place, deleted only whole-group by transaction id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub transaction_id: String,
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    pub account_id: String,
    pub account_name: String,
    /// Always non-negative; normally exactly one of debit/credit is non-zero,
    /// but the model does not enforce this.
    pub debit: Decimal,
    pub credit: Decimal,
    pub currency: String,
    pub exchange_rate: Decimal,
    /// Foreign-currency shadow amount.
    pub fcy_amount: Decimal,
    pub narration: String,
    /// Tenant/location partition key.
    pub factory_id: String,
    /// Marks synthetic corrective entries created by the repair tools.
    pub is_adjustment: bool,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Creates a new debit entry.
    pub fn debit(
        transaction_id: impl Into<String>,
        date: NaiveDate,
        transaction_type: TransactionType,
        account_id: impl Into<String>,
        account_name: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self::new(
            transaction_id,
            date,
            transaction_type,
            account_id,
            account_name,
            amount,
            Decimal::ZERO,
        )
    }

    /// Creates a new credit entry.
    pub fn credit(
        transaction_id: impl Into<String>,
        date: NaiveDate,
        transaction_type: TransactionType,
        account_id: impl Into<String>,
        account_name: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self::new(
            transaction_id,
            date,
            transaction_type,
            account_id,
            account_name,
            Decimal::ZERO,
            amount,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        transaction_id: impl Into<String>,
        date: NaiveDate,
        transaction_type: TransactionType,
        account_id: impl Into<String>,
        account_name: impl Into<String>,
        debit: Decimal,
        credit: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.into(),
            date,
            transaction_type,
            account_id: account_id.into(),
            account_name: account_name.into(),
            debit,
            credit,
            currency: "USD".to_string(),
            exchange_rate: Decimal::ONE,
            fcy_amount: Decimal::ZERO,
            narration: String::new(),
            factory_id: String::new(),
            is_adjustment: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = narration.into();
        self
    }

    pub fn with_factory(mut self, factory_id: impl Into<String>) -> Self {
        self.factory_id = factory_id.into();
        self
    }

    pub fn with_currency(
        mut self,
        currency: impl Into<String>,
        exchange_rate: Decimal,
        fcy_amount: Decimal,
    ) -> Self {
        self.currency = currency.into();
        self.exchange_rate = exchange_rate;
        self.fcy_amount = fcy_amount;
        self
    }

    /// Marks the entry as a synthetic corrective posting.
    pub fn as_adjustment(mut self) -> Self {
        self.is_adjustment = true;
        self
    }

    /// Net signed amount from the debit-normal perspective.
    pub fn signed_amount(&self) -> Decimal {
        self.debit - self.credit
    }
}
