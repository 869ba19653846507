use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::requests::{
    ApplyRepairsRequest, DeleteTransactionRequest, PostTransactionRequest, RenumberRequest,
};
use crate::api::responses::{
    ApiError, ApiResponse, HealthResponse, ValidationErrorDetail,
};
use crate::error::AppError;
use crate::models::LedgerEntry;
use crate::observability::metrics;
use crate::services::{
    AuditService, BalanceService, DetectedIssue, FixOptions, FixSummary, ImbalanceReport,
    LedgerService, RecalcSummary, RenumberService, RenumberSummary, RepairService, ScanService,
};

use super::routes::AppState;

type HandlerResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn validation_failed(errors: Vec<crate::api::requests::ValidationError>) -> ApiError {
    let details = errors
        .into_iter()
        .map(|e| ValidationErrorDetail {
            field: e.field,
            message: e.message,
        })
        .collect();
    ApiError::validation_details(details)
}

/// Health check endpoint.
pub async fn health_check() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    }))
}

/// Liveness check endpoint.
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    match &state.metrics_handle {
        Some(handle) => Ok(handle.render()),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Run the imbalance audit: per-transaction, stored-vs-derived and global.
pub async fn audit_imbalances(State(state): State<AppState>) -> HandlerResult<ImbalanceReport> {
    let service = AuditService::new(state.store.clone(), state.policy.clone(), state.tolerance);
    let started = std::time::Instant::now();
    let report = service.run().await?;
    metrics::record_audit(&report, started.elapsed().as_secs_f64() * 1000.0);
    Ok(Json(ApiResponse::success(report)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub issues: Vec<DetectedIssue>,
    pub total: usize,
}

/// Run the missing-posting scans.
pub async fn scan_missing_postings(State(state): State<AppState>) -> HandlerResult<ScanResponse> {
    let service = ScanService::new(state.store.clone(), state.roles.as_ref().clone());
    let issues = service.run_all().await?;
    metrics::record_issues_detected(issues.len());
    Ok(Json(ApiResponse::success(ScanResponse {
        total: issues.len(),
        issues,
    })))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairResponse {
    pub issues_detected: usize,
    pub summary: FixSummary,
    /// Stored balances are re-derived after any run that wrote entries.
    pub recalculation: Option<RecalcSummary>,
}

/// Detect everything and apply corrective postings in one pass.
pub async fn apply_repairs(
    State(state): State<AppState>,
    Json(request): Json<ApplyRepairsRequest>,
) -> HandlerResult<RepairResponse> {
    let audit = AuditService::new(state.store.clone(), state.policy.clone(), state.tolerance);
    let scan = ScanService::new(state.store.clone(), state.roles.as_ref().clone());

    let report = audit.run().await?;
    let mut issues: Vec<DetectedIssue> = report.unbalanced.iter().map(DetectedIssue::from).collect();
    issues.extend(scan.run_all().await?);

    let repair = RepairService::new(
        state.store.clone(),
        state.roles.as_ref().clone(),
        state.policy.clone(),
        state.tolerance,
    );
    let options = FixOptions {
        dry_run: request.dry_run,
        on_progress: None,
    };
    let started = std::time::Instant::now();
    let summary = repair.apply(&issues, &options).await?;
    metrics::record_repair(&summary, started.elapsed().as_secs_f64() * 1000.0);

    // Corrective entries shift derived balances; bring the stored scalars
    // back in line before reporting.
    let recalculation = if !summary.dry_run && summary.entries_written > 0 {
        let balance =
            BalanceService::new(state.store.clone(), state.policy.clone(), state.tolerance);
        Some(balance.recalculate_all().await?)
    } else {
        None
    };

    Ok(Json(ApiResponse::success(RepairResponse {
        issues_detected: issues.len(),
        summary,
        recalculation,
    })))
}

/// Recalculate every stored balance from the ledger.
pub async fn recalculate_balances(State(state): State<AppState>) -> HandlerResult<RecalcSummary> {
    let service = BalanceService::new(state.store.clone(), state.policy.clone(), state.tolerance);
    let summary = service.recalculate_all().await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostTransactionResponse {
    pub transaction_id: String,
    pub entries_posted: usize,
}

/// Post one transaction group.
pub async fn post_transaction(
    State(state): State<AppState>,
    Json(request): Json<PostTransactionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PostTransactionResponse>>), ApiError> {
    if let Err(errors) = request.validate() {
        return Err(validation_failed(errors));
    }

    let entries: Vec<LedgerEntry> = request
        .entries
        .iter()
        .map(|e| {
            let mut entry = if e.credit > e.debit {
                LedgerEntry::credit(
                    &request.transaction_id,
                    request.date,
                    request.transaction_type,
                    &e.account_id,
                    &e.account_name,
                    e.credit,
                )
            } else {
                LedgerEntry::debit(
                    &request.transaction_id,
                    request.date,
                    request.transaction_type,
                    &e.account_id,
                    &e.account_name,
                    e.debit,
                )
            };
            if let Some(narration) = &e.narration {
                entry = entry.with_narration(narration);
            }
            if let Some(factory) = &e.factory_id {
                entry = entry.with_factory(factory);
            }
            entry
        })
        .collect();

    let service = LedgerService::new(state.store.clone());
    let posted = service.post_transaction(&entries).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(PostTransactionResponse {
            transaction_id: request.transaction_id,
            entries_posted: posted,
        })),
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTransactionResponse {
    pub transaction_id: String,
    pub entries_deleted: usize,
}

/// Delete a whole transaction group. Destructive; requires the secondary
/// authorization code from configuration.
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    Json(request): Json<DeleteTransactionRequest>,
) -> HandlerResult<DeleteTransactionResponse> {
    if let Err(errors) = request.validate() {
        return Err(validation_failed(errors));
    }
    let expected = state.authorization_code.as_deref().ok_or_else(|| {
        AppError::Unauthorized("no authorization code configured; deletion disabled".to_string())
    })?;
    if request.authorization_code != expected {
        return Err(AppError::Unauthorized("authorization code mismatch".to_string()).into());
    }

    let service = LedgerService::new(state.store.clone());
    let deleted = service
        .delete_transaction(&transaction_id, &request.reason, &request.actor)
        .await?;

    Ok(Json(ApiResponse::success(DeleteTransactionResponse {
        transaction_id,
        entries_deleted: deleted,
    })))
}

/// Renumber one configured entity kind and cascade its references.
pub async fn renumber(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(request): Json<RenumberRequest>,
) -> HandlerResult<RenumberSummary> {
    let spec = state
        .renumber
        .iter()
        .find(|s| s.kind == kind)
        .ok_or_else(|| AppError::NotFound(format!("no renumber kind '{}' configured", kind)))?;

    let service = RenumberService::new(state.store.clone());
    let summary = service.run(spec, request.dry_run).await?;
    Ok(Json(ApiResponse::success(summary)))
}
