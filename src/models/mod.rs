pub mod account;
pub mod ledger_entry;
pub mod partner;
pub mod trade_docs;

pub use account::{Account, AccountType, NormalSide};
pub use ledger_entry::{LedgerEntry, TransactionType};
pub use partner::{Partner, PartnerType, SignPolicy};
pub use trade_docs::{DocStatus, InvoiceLine, OriginalOpening, Production, Purchase, SalesInvoice};
