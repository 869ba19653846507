//! Engine services: auditing, scanning, repair and the maintenance utilities.

pub mod audit;
pub mod balance;
pub mod grouping;
pub mod ledger;
pub mod renumber;
pub mod repair;
pub mod scan;

pub use audit::{AuditService, BalanceMismatch, ImbalanceReport, OwnerKind, UnbalancedTransaction};
pub use balance::{derive_balance, BalanceService, RecalcSummary};
pub use grouping::{group_by_transaction, TransactionGroup};
pub use ledger::LedgerService;
pub use renumber::{RenumberService, RenumberSummary};
pub use repair::{FixOptions, FixProgress, FixSummary, RepairService};
pub use scan::{DetectedIssue, ScanService};
