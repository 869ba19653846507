use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::account::NormalSide;

/// Counterparty kinds. Customers behave asset-like (debit-normal), the
/// supplier-like kinds behave liability-like (credit-normal) under the
/// default sign policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerType {
    Customer,
    Supplier,
    Vendor,
    FreightForwarder,
    ClearingAgent,
    CommissionAgent,
}

impl PartnerType {
    pub const ALL: [PartnerType; 6] = [
        PartnerType::Customer,
        PartnerType::Supplier,
        PartnerType::Vendor,
        PartnerType::FreightForwarder,
        PartnerType::ClearingAgent,
        PartnerType::CommissionAgent,
    ];
}

/// Per-partner-type normal-side policy. Whether the supplier-like kinds all
/// share SUPPLIER's credit-normal convention is configuration, not a
/// hard-coded rule.
#[derive(Debug, Clone)]
pub struct SignPolicy {
    sides: HashMap<PartnerType, NormalSide>,
}

impl Default for SignPolicy {
    fn default() -> Self {
        let mut sides = HashMap::new();
        for kind in PartnerType::ALL {
            let side = match kind {
                PartnerType::Customer => NormalSide::Debit,
                _ => NormalSide::Credit,
            };
            sides.insert(kind, side);
        }
        Self { sides }
    }
}

impl SignPolicy {
    pub fn normal_side(&self, kind: PartnerType) -> NormalSide {
        // Default map covers every kind; the unwrap_or is for policies built
        // from partial config overrides.
        self.sides
            .get(&kind)
            .copied()
            .unwrap_or(NormalSide::Credit)
    }

    pub fn with_override(mut self, kind: PartnerType, side: NormalSide) -> Self {
        self.sides.insert(kind, side);
        self
    }
}

/// A customer or supplier-like counterparty.
///
/// `balance` carries the same cached-vs-derived contract as
/// [`super::Account::balance`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub partner_type: PartnerType,
    pub balance: Decimal,
    pub factory_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Partner {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        partner_type: PartnerType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            partner_type,
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

    pub fn normal_side(&self, policy: &SignPolicy) -> NormalSide {
        policy.normal_side(self.partner_type)
    }

    /// Transaction id of this partner's opening-balance group.
    pub fn opening_transaction_id(&self) -> String {
        format!("OB-{}", self.id)
    }
}
