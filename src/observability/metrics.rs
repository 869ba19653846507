use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::services::{FixSummary, ImbalanceReport};

/// Installs the Prometheus recorder and registers metric descriptions.
/// Returns the handle the `/metrics` endpoint renders from.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        "recon_audits_total",
        "Imbalance audit runs completed"
    );
    describe_gauge!(
        "recon_unbalanced_transactions",
        "Unbalanced transaction groups found by the last audit"
    );
    describe_gauge!(
        "recon_balance_mismatches",
        "Stored-vs-derived balance mismatches found by the last audit"
    );
    describe_counter!(
        "recon_issues_detected_total",
        "Findings produced by the missing-posting scans"
    );
    describe_counter!(
        "recon_fixes_applied_total",
        "Issues repaired by corrective postings"
    );
    describe_counter!(
        "recon_fixes_skipped_total",
        "Issues found already healthy at fix time"
    );
    describe_counter!(
        "recon_fix_errors_total",
        "Repair batches or fixes that failed"
    );
    describe_counter!(
        "recon_entries_written_total",
        "Corrective ledger entries committed"
    );
    describe_histogram!(
        "recon_audit_duration_ms",
        "Wall time of imbalance audit runs"
    );
    describe_histogram!(
        "recon_repair_duration_ms",
        "Wall time of repair runs"
    );

    Ok(handle)
}

pub fn record_audit(report: &ImbalanceReport, duration_ms: f64) {
    counter!("recon_audits_total").increment(1);
    gauge!("recon_unbalanced_transactions").set(report.unbalanced.len() as f64);
    gauge!("recon_balance_mismatches").set(report.mismatches.len() as f64);
    histogram!("recon_audit_duration_ms").record(duration_ms);
}

pub fn record_issues_detected(count: usize) {
    counter!("recon_issues_detected_total").increment(count as u64);
}

pub fn record_repair(summary: &FixSummary, duration_ms: f64) {
    histogram!("recon_repair_duration_ms").record(duration_ms);
    if summary.dry_run {
        return;
    }
    counter!("recon_fixes_applied_total").increment(summary.fixed as u64);
    counter!("recon_fixes_skipped_total").increment(summary.skipped as u64);
    counter!("recon_fix_errors_total").increment(summary.errors.len() as u64);
    counter!("recon_entries_written_total").increment(summary.entries_written as u64);
}
