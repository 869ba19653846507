use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Posting status of a header document (purchase, sales invoice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocStatus {
    Draft,
    Posted,
    Cancelled,
}

/// A purchase header. A posted purchase with positive landed cost is expected
/// to have a ledger group under `OB-PUR-{id}` (inventory debit, capital/AP
/// credit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub supplier_id: String,
    pub date: NaiveDate,
    pub landed_cost: Decimal,
    pub status: DocStatus,
    pub factory_id: String,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    /// Transaction id of this purchase's inventory/capital posting group.
    pub fn posting_transaction_id(&self) -> String {
        format!("OB-PUR-{}", self.id)
    }
}

/// One item line on a sales invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub item: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Specific cost for this line, when known.
    pub unit_cost: Option<Decimal>,
    /// Item average cost, the fallback when no specific cost was captured.
    pub avg_cost: Option<Decimal>,
}

impl InvoiceLine {
    /// Cost value of the line: quantity x unit cost, falling back to the
    /// item's average cost when no specific cost is present.
    pub fn cost_value(&self) -> Decimal {
        let unit = self
            .unit_cost
            .or(self.avg_cost)
            .unwrap_or(Decimal::ZERO);
        self.quantity * unit
    }
}

/// A sales invoice header. A posted invoice with item lines is expected to
/// carry a COGS debit and a finished-goods inventory-reduction credit in its
/// ledger group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesInvoice {
    pub id: String,
    pub customer_id: String,
    pub date: NaiveDate,
    pub status: DocStatus,
    pub lines: Vec<InvoiceLine>,
    pub factory_id: String,
    pub created_at: DateTime<Utc>,
}

impl SalesInvoice {
    pub fn is_posted(&self) -> bool {
        self.status == DocStatus::Posted
    }

    pub fn has_item_lines(&self) -> bool {
        self.lines.iter().any(|l| !l.quantity.is_zero())
    }

    /// Total cost of goods sold across all lines.
    pub fn cogs_value(&self) -> Decimal {
        self.lines.iter().map(InvoiceLine::cost_value).sum()
    }
}

/// A manufacturing output record. Expected to consume WIP (debit finished
/// goods, credit WIP) or, when no opening exists for its date, credit a
/// production-gain account instead. Never left uncredited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Production {
    pub id: String,
    pub date: NaiveDate,
    pub item: String,
    pub qty_produced: Decimal,
    pub weight: Decimal,
    pub unit_price: Decimal,
    /// Item average cost, the fallback when `unit_price` is zero.
    pub avg_cost: Option<Decimal>,
    pub factory_id: String,
    pub created_at: DateTime<Utc>,
}

impl Production {
    /// Value of the output: quantity x unit production price, falling back to
    /// the item's average cost.
    pub fn expected_value(&self) -> Decimal {
        let unit = if self.unit_price.is_zero() {
            self.avg_cost.unwrap_or(Decimal::ZERO)
        } else {
            self.unit_price
        };
        self.qty_produced * unit
    }
}

/// Raw-material stock brought into a factory outside the purchase flow; the
/// WIP-consumption counterpart for production postings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalOpening {
    pub id: String,
    pub date: NaiveDate,
    pub item: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub factory_id: String,
    pub created_at: DateTime<Utc>,
}
