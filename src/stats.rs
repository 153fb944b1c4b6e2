//! Compliance overview.
//!
//! `qms modules` prints per-module counts with readiness; `qms summary`
//! prints the dashboard headline numbers. Both read a fresh snapshot and
//! can emit the same JSON the HTTP server returns.

use anyhow::Result;
use serde::Serialize;

use qms_harness_core::aggregate::{
    audit_summary, module_readiness, module_stats, monthly_comparison, review_summary,
    AuditSummary, ModuleReadiness, ModuleStats, MonthlyComparison, ReviewSummary,
};
use qms_harness_core::refresh::Snapshot;

use crate::backends::Backends;

/// Module counts joined with their readiness.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOverview {
    #[serde(flatten)]
    pub stats: ModuleStats,
    pub readiness: ModuleReadiness,
}

pub fn module_overview(snapshot: &Snapshot) -> Vec<ModuleOverview> {
    module_stats(&snapshot.records)
        .into_iter()
        .map(|stats| {
            let readiness = module_readiness(&stats);
            ModuleOverview { stats, readiness }
        })
        .collect()
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub audit: AuditSummary,
    pub review: ReviewSummary,
    pub monthly: MonthlyComparison,
    /// False when some folders could not be listed and counts fell back
    /// to the sheet.
    pub complete: bool,
    pub unavailable_folders: Vec<String>,
}

pub fn summary(snapshot: &Snapshot) -> Summary {
    Summary {
        audit: audit_summary(&snapshot.records),
        review: review_summary(&snapshot.records),
        monthly: monthly_comparison(&snapshot.records, snapshot.taken_at),
        complete: snapshot.is_complete(),
        unavailable_folders: snapshot.unavailable_folders.clone(),
    }
}

pub(crate) fn warn_incomplete(snapshot: &Snapshot) {
    if !snapshot.is_complete() {
        eprintln!(
            "warning: {} folder(s) could not be listed; their counts come from the sheet",
            snapshot.unavailable_folders.len()
        );
    }
}

pub async fn run_modules(backends: &Backends, json: bool) -> Result<()> {
    let snapshot = backends.snapshot().await?;
    let overview = module_overview(&snapshot);

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    if overview.is_empty() {
        println!("No modules.");
        return Ok(());
    }

    println!(
        "{:<12} {:<26} {:>6} {:>8} {:>8} {:>7}   {:<16} {:>8}",
        "MODULE", "NAME", "FORMS", "RECORDS", "PENDING", "ISSUES", "READINESS", "PROGRESS"
    );
    println!("{}", "-".repeat(104));
    for m in &overview {
        println!(
            "{:<12} {:<26} {:>6} {:>8} {:>8} {:>7}   {:<16} {:>7}%",
            m.stats.id,
            m.stats.name,
            m.stats.forms_count,
            m.stats.records_count,
            m.stats.pending_count,
            m.stats.issues_count,
            m.readiness.status.label(),
            m.readiness.progress
        );
    }
    warn_incomplete(&snapshot);
    Ok(())
}

pub async fn run_summary(backends: &Backends, json: bool) -> Result<()> {
    let snapshot = backends.snapshot().await?;
    let s = summary(&snapshot);

    if json {
        println!("{}", serde_json::to_string_pretty(&s)?);
        return Ok(());
    }

    let trend = if s.monthly.is_positive { "+" } else { "-" };

    println!("QMS Compliance Summary");
    println!("======================");
    println!();
    println!("  Forms:            {}", s.audit.total);
    println!("  Compliant files:  {}", s.audit.compliant);
    println!("  Pending files:    {}", s.audit.pending);
    println!("  Forms w/ issues:  {}", s.audit.issues);
    println!("  Compliance rate:  {}%", s.audit.compliance_rate);
    println!();
    println!(
        "  Reviews:          {} completed, {} pending",
        s.review.completed, s.review.pending
    );
    println!(
        "  Last 30 days:     {} forms filled ({}{}% vs previous 30 days: {})",
        s.monthly.current_month, trend, s.monthly.percentage_change, s.monthly.previous_month
    );
    println!();
    println!("  As of:            {}", snapshot.taken_at.format("%Y-%m-%d %H:%M UTC"));
    if !s.complete {
        println!("  Unlisted folders: {}", s.unavailable_folders.join(", "));
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use qms_harness_core::aggregate::ReadinessStatus;
    use qms_harness_core::refresh::load_snapshot;
    use qms_harness_core::store::memory::{InMemoryDocuments, InMemorySheet};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn overview_joins_readiness() {
        let mut issue = row(&["05-HR", "HR/02", "Training log", "", "Yearly", "", ""]);
        issue.resize(16, String::new());
        issue[15] = r#"{"recordStatus":"rejected"}"#.into();

        let sheet = InMemorySheet::new(vec![
            row(&["Category", "Code", "Name"]),
            row(&["02-Operations", "OP/01", "Batch record", "", "Weekly", "", ""]),
            issue,
        ]);
        let docs = InMemoryDocuments::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let snapshot = load_snapshot(&sheet, &docs, now).await.unwrap();

        let overview = module_overview(&snapshot);
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].stats.id, "operations");
        assert_eq!(overview[0].readiness.status, ReadinessStatus::Compliant);
        assert_eq!(overview[0].readiness.progress, 0);
        assert_eq!(overview[1].readiness.status, ReadinessStatus::Attention);

        let json = serde_json::to_value(&overview[0]).unwrap();
        assert_eq!(json["formsCount"], 1);
        assert_eq!(json["readiness"]["status"], "compliant");

        let s = summary(&snapshot);
        assert!(s.complete);
        assert_eq!(s.audit.total, 2);
        assert_eq!(s.audit.issues, 1);
    }
}
