use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use tower_http::trace::TraceLayer;

use crate::config::{AccountRoles, RenumberKindSettings};
use crate::models::SignPolicy;
use crate::store::DocumentStore;

use super::handlers;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    /// Account roles resolved once at startup.
    pub roles: Arc<AccountRoles>,
    pub policy: SignPolicy,
    pub tolerance: Decimal,
    pub authorization_code: Option<String>,
    pub renumber: Arc<Vec<RenumberKindSettings>>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        roles: AccountRoles,
        policy: SignPolicy,
        tolerance: Decimal,
    ) -> Self {
        Self {
            store,
            roles: Arc::new(roles),
            policy,
            tolerance,
            authorization_code: None,
            renumber: Arc::new(Vec::new()),
            metrics_handle: None,
        }
    }

    pub fn with_authorization_code(mut self, code: Option<String>) -> Self {
        self.authorization_code = code;
        self
    }

    pub fn with_renumber_kinds(mut self, kinds: Vec<RenumberKindSettings>) -> Self {
        self.renumber = Arc::new(kinds);
        self
    }

    /// Adds metrics handle to the state.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

/// Creates the admin API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Audit and scan endpoints
        .route("/audit/imbalances", get(handlers::audit_imbalances))
        .route("/audit/missing-postings", get(handlers::scan_missing_postings))
        // Repair endpoints
        .route("/repairs/apply", post(handlers::apply_repairs))
        .route("/balances/recalculate", post(handlers::recalculate_balances))
        // Ledger endpoints
        .route("/transactions", post(handlers::post_transaction))
        .route("/transactions/:id/delete", post(handlers::delete_transaction))
        // Maintenance endpoints
        .route("/renumber/:kind", post(handlers::renumber))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
