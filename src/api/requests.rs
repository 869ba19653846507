use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::TransactionType;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

fn err(field: &str, message: &str) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// One leg of a transaction to post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostEntryRequest {
    pub account_id: String,
    pub account_name: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub narration: Option<String>,
    pub factory_id: Option<String>,
}

/// Request to post a new transaction group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostTransactionRequest {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    pub entries: Vec<PostEntryRequest>,
}

impl PostTransactionRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.transaction_id.trim().is_empty() {
            errors.push(err("transaction_id", "transaction_id cannot be empty"));
        }
        if self.entries.is_empty() {
            errors.push(err("entries", "at least one entry is required"));
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.account_id.trim().is_empty() {
                errors.push(err(
                    &format!("entries[{}].account_id", i),
                    "account_id cannot be empty",
                ));
            }
            if entry.debit < Decimal::ZERO || entry.credit < Decimal::ZERO {
                errors.push(err(
                    &format!("entries[{}]", i),
                    "amounts must be non-negative",
                ));
            }
            if entry.debit > Decimal::ZERO && entry.credit > Decimal::ZERO {
                errors.push(err(
                    &format!("entries[{}]", i),
                    "an entry carries either a debit or a credit, not both",
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Request to delete a whole transaction group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTransactionRequest {
    pub reason: String,
    pub actor: String,
    /// Secondary code required on top of normal authentication.
    pub authorization_code: String,
}

impl DeleteTransactionRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.reason.trim().is_empty() {
            errors.push(err("reason", "reason cannot be empty"));
        }
        if self.actor.trim().is_empty() {
            errors.push(err("actor", "actor cannot be empty"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Request to run the repair pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyRepairsRequest {
    pub dry_run: bool,
}

/// Request to renumber one entity kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenumberRequest {
    pub dry_run: bool,
}
