use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Account, NormalSide, PartnerType, SignPolicy};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub store: StoreSettings,
    pub engine: EngineSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            application: ApplicationSettings::default(),
            store: StoreSettings::default(),
            engine: EngineSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// JSON snapshot the in-memory store loads at startup.
    pub snapshot_path: Option<String>,
    /// Per-batch mutation ceiling enforced by the store.
    pub batch_ceiling: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            batch_ceiling: crate::store::memory::DEFAULT_BATCH_CEILING,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Imbalance tolerance, kept as a string so the decimal survives config
    /// layering exactly.
    pub tolerance: String,
    /// Secondary code required for destructive operations.
    pub authorization_code: Option<String>,
    /// Partner types treated as debit-normal; all others are credit-normal.
    pub debit_normal_partner_types: Vec<PartnerType>,
    pub roles: RoleSettings,
    pub renumber: Vec<RenumberKindSettings>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tolerance: "0.01".to_string(),
            authorization_code: None,
            debit_normal_partner_types: vec![PartnerType::Customer],
            roles: RoleSettings::default(),
            renumber: default_renumber_kinds(),
        }
    }
}

impl EngineSettings {
    pub fn tolerance(&self) -> Result<Decimal> {
        self.tolerance.parse().map_err(|_| {
            AppError::Validation(format!("invalid tolerance '{}'", self.tolerance))
        })
    }

    pub fn sign_policy(&self) -> SignPolicy {
        let mut policy = SignPolicy::default();
        for kind in PartnerType::ALL {
            let side = if self.debit_normal_partner_types.contains(&kind) {
                NormalSide::Debit
            } else {
                NormalSide::Credit
            };
            policy = policy.with_override(kind, side);
        }
        policy
    }
}

/// One logical account role: an optional pinned account id, plus the
/// name-substring candidates used when no id is pinned. Candidates are tried
/// in order against the chart of accounts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoleLookup {
    pub account_id: Option<String>,
    pub candidates: Vec<String>,
}

impl RoleLookup {
    fn named(candidates: &[&str]) -> Self {
        Self {
            account_id: None,
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoleSettings {
    pub balance_adjustment: RoleLookup,
    pub production_gain: RoleLookup,
    pub capital: RoleLookup,
    pub opening_equity: RoleLookup,
    pub inventory_finished_goods: RoleLookup,
    pub inventory_raw: RoleLookup,
    pub wip: RoleLookup,
    pub cogs: RoleLookup,
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self {
            balance_adjustment: RoleLookup::named(&["Balance Adjustment", "Suspense"]),
            production_gain: RoleLookup::named(&["Production Gain"]),
            capital: RoleLookup::named(&["Capital"]),
            opening_equity: RoleLookup::named(&["Opening Equity", "Opening Balance Equity"]),
            inventory_finished_goods: RoleLookup::named(&["Inventory - Finished Goods"]),
            inventory_raw: RoleLookup::named(&["Inventory - Raw", "Inventory - Raw Materials"]),
            wip: RoleLookup::named(&["Work in Progress", "WIP"]),
            cogs: RoleLookup::named(&["Cost of Goods Sold"]),
        }
    }
}

/// A resolved role: the concrete chart account serving it.
#[derive(Debug, Clone)]
pub struct RoleAccount {
    pub account_id: String,
    pub account_name: String,
}

/// Logical account roles resolved once at startup against the chart of
/// accounts and validated eagerly; services receive ids, never re-run the
/// name search per fix.
#[derive(Debug, Clone)]
pub struct AccountRoles {
    pub balance_adjustment: RoleAccount,
    pub production_gain: RoleAccount,
    pub capital: RoleAccount,
    pub opening_equity: RoleAccount,
    pub inventory_finished_goods: RoleAccount,
    pub inventory_raw: RoleAccount,
    pub wip: RoleAccount,
    pub cogs: RoleAccount,
}

impl AccountRoles {
    /// Resolves every role or fails fast listing the names attempted.
    ///
    /// Fallback chain: balance adjustment, production gain and opening
    /// equity fall back to the capital account when their own candidates
    /// match nothing.
    pub fn resolve(settings: &RoleSettings, accounts: &[Account]) -> Result<Self> {
        let capital = resolve_role("capital", &settings.capital, accounts, None)?;
        Ok(Self {
            balance_adjustment: resolve_role(
                "balance_adjustment",
                &settings.balance_adjustment,
                accounts,
                Some(&capital),
            )?,
            production_gain: resolve_role(
                "production_gain",
                &settings.production_gain,
                accounts,
                Some(&capital),
            )?,
            opening_equity: resolve_role(
                "opening_equity",
                &settings.opening_equity,
                accounts,
                Some(&capital),
            )?,
            inventory_finished_goods: resolve_role(
                "inventory_finished_goods",
                &settings.inventory_finished_goods,
                accounts,
                None,
            )?,
            inventory_raw: resolve_role("inventory_raw", &settings.inventory_raw, accounts, None)?,
            wip: resolve_role("wip", &settings.wip, accounts, None)?,
            cogs: resolve_role("cogs", &settings.cogs, accounts, None)?,
            capital,
        })
    }
}

fn resolve_role(
    role: &str,
    lookup: &RoleLookup,
    accounts: &[Account],
    fallback: Option<&RoleAccount>,
) -> Result<RoleAccount> {
    if let Some(id) = &lookup.account_id {
        return accounts
            .iter()
            .find(|a| &a.id == id)
            .map(|a| RoleAccount {
                account_id: a.id.clone(),
                account_name: a.name.clone(),
            })
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "account role '{}' is pinned to unknown account id '{}'",
                    role, id
                ))
            });
    }

    for candidate in &lookup.candidates {
        if let Some(account) = accounts.iter().find(|a| a.name.contains(candidate)) {
            return Ok(RoleAccount {
                account_id: account.id.clone(),
                account_name: account.name.clone(),
            });
        }
    }

    if let Some(fallback) = fallback {
        return Ok(fallback.clone());
    }

    Err(AppError::Validation(format!(
        "cannot resolve account role '{}'; attempted name matches: {:?}",
        role, lookup.candidates
    )))
}

/// One entity kind handled by the renumbering utility.
#[derive(Debug, Clone, Deserialize)]
pub struct RenumberKindSettings {
    pub kind: String,
    pub collection: String,
    /// Required id format. Documents whose id does not match are renumbered.
    pub id_pattern: String,
    pub prefix: String,
    pub seed: u32,
    pub references: Vec<ReferenceFieldSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceFieldSettings {
    pub collection: String,
    pub field: String,
}

fn reference(collection: &str, field: &str) -> ReferenceFieldSettings {
    ReferenceFieldSettings {
        collection: collection.to_string(),
        field: field.to_string(),
    }
}

fn default_renumber_kinds() -> Vec<RenumberKindSettings> {
    vec![
        RenumberKindSettings {
            kind: "divisions".to_string(),
            collection: "divisions".to_string(),
            id_pattern: r"^DIV-\d+$".to_string(),
            prefix: "DIV".to_string(),
            seed: 1001,
            references: vec![
                reference("sub_divisions", "division_id"),
                reference("productions", "division_id"),
            ],
        },
        RenumberKindSettings {
            kind: "sub_divisions".to_string(),
            collection: "sub_divisions".to_string(),
            id_pattern: r"^SDIV-\d+$".to_string(),
            prefix: "SDIV".to_string(),
            seed: 1001,
            references: vec![reference("productions", "sub_division_id")],
        },
        RenumberKindSettings {
            kind: "categories".to_string(),
            collection: "categories".to_string(),
            id_pattern: r"^CAT-\d+$".to_string(),
            prefix: "CAT".to_string(),
            seed: 1001,
            references: vec![reference("original_products", "category_id")],
        },
        RenumberKindSettings {
            kind: "sections".to_string(),
            collection: "sections".to_string(),
            id_pattern: r"^SEC-\d+$".to_string(),
            prefix: "SEC".to_string(),
            seed: 1001,
            references: vec![reference("productions", "section_id")],
        },
        RenumberKindSettings {
            kind: "original_types".to_string(),
            collection: "original_types".to_string(),
            id_pattern: r"^OT-\d+$".to_string(),
            prefix: "OT".to_string(),
            seed: 1001,
            references: vec![
                reference("original_products", "type_id"),
                reference("original_openings", "type_id"),
            ],
        },
        RenumberKindSettings {
            kind: "original_products".to_string(),
            collection: "original_products".to_string(),
            id_pattern: r"^OP-\d+$".to_string(),
            prefix: "OP".to_string(),
            seed: 1001,
            references: vec![
                reference("original_openings", "product_id"),
                reference("productions", "product_id"),
            ],
        },
    ]
}

impl Settings {
    pub fn new() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountType;
    use rust_decimal_macros::dec;

    fn chart() -> Vec<Account> {
        vec![
            Account::new("A-1", "1100", "Inventory - Finished Goods", AccountType::Asset),
            Account::new("A-2", "1200", "Inventory - Raw Materials", AccountType::Asset),
            Account::new("A-3", "5000", "Cost of Goods Sold", AccountType::Expense),
            Account::new("A-4", "3000", "Capital", AccountType::Equity),
            Account::new("A-5", "1300", "Work in Progress", AccountType::Asset),
        ]
    }

    #[test]
    fn test_tolerance_parses() {
        let engine = EngineSettings::default();
        assert_eq!(engine.tolerance().unwrap(), dec!(0.01));
    }

    #[test]
    fn test_sign_policy_from_settings() {
        let engine = EngineSettings {
            debit_normal_partner_types: vec![PartnerType::Customer, PartnerType::Vendor],
            ..EngineSettings::default()
        };
        let policy = engine.sign_policy();
        assert_eq!(policy.normal_side(PartnerType::Vendor), NormalSide::Debit);
        assert_eq!(policy.normal_side(PartnerType::Supplier), NormalSide::Credit);
    }

    #[test]
    fn test_role_resolution_with_capital_fallback() {
        // No Balance Adjustment / Production Gain / Opening Equity accounts
        // in the chart; those roles fall back to Capital.
        let roles = AccountRoles::resolve(&RoleSettings::default(), &chart()).unwrap();
        assert_eq!(roles.cogs.account_name, "Cost of Goods Sold");
        assert_eq!(roles.balance_adjustment.account_id, "A-4");
        assert_eq!(roles.production_gain.account_id, "A-4");
        assert_eq!(roles.opening_equity.account_id, "A-4");
    }

    #[test]
    fn test_role_resolution_prefers_dedicated_accounts() {
        let mut accounts = chart();
        accounts.push(Account::new(
            "A-6",
            "3900",
            "Balance Adjustment",
            AccountType::Equity,
        ));
        accounts.push(Account::new(
            "A-7",
            "3800",
            "Production Gain",
            AccountType::Equity,
        ));

        let roles = AccountRoles::resolve(&RoleSettings::default(), &accounts).unwrap();
        assert_eq!(roles.balance_adjustment.account_id, "A-6");
        assert_eq!(roles.production_gain.account_id, "A-7");
    }

    #[test]
    fn test_role_resolution_fails_fast_without_required_account() {
        let accounts = vec![Account::new("A-1", "1000", "Cash", AccountType::Asset)];
        let err = AccountRoles::resolve(&RoleSettings::default(), &accounts).unwrap_err();
        assert!(err.to_string().contains("capital"));
    }

    #[test]
    fn test_pinned_role_id_must_exist() {
        let mut settings = RoleSettings::default();
        settings.cogs.account_id = Some("A-404".to_string());
        let err = AccountRoles::resolve(&settings, &chart()).unwrap_err();
        assert!(err.to_string().contains("A-404"));
    }

    #[test]
    fn test_default_renumber_kinds_cover_observed_entities() {
        let kinds = default_renumber_kinds();
        assert_eq!(kinds.len(), 6);
        assert!(kinds.iter().any(|k| k.kind == "divisions"));
        assert!(kinds.iter().all(|k| k.id_pattern.starts_with('^')));
    }
}
