//! Record-level read commands.
//!
//! | Command | Prints |
//! |---------|--------|
//! | `qms records` | every merged record, optionally filtered |
//! | `qms show <code>` | one record with its files and reviews |
//! | `qms activity` | most recently filled records |
//! | `qms pending` | overdue and upcoming forms |
//! | `qms audit` | per-file audit items by bucket |

use anyhow::{bail, Result};
use clap::ValueEnum;
use serde::Serialize;

use qms_harness_core::aggregate::{activity_feed, audit_buckets, pending_actions, AuditItem, PendingItem};
use qms_harness_core::review::classify;
use qms_harness_core::taxonomy::{module_by_id, normalize_category};
use qms_harness_core::QmsRecord;

use crate::backends::Backends;
use crate::stats::warn_incomplete;

/// Filters for `qms records`.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub module: Option<String>,
    pub overdue: bool,
}

impl RecordFilter {
    pub fn matches(&self, record: &QmsRecord) -> bool {
        if self.overdue && !record.is_overdue {
            return false;
        }
        match &self.module {
            Some(id) => normalize_category(&record.template.category).is_some_and(|m| m.id == id),
            None => true,
        }
    }
}

fn days_cell(record: &QmsRecord) -> String {
    match record.days_until_next_fill {
        Some(d) if record.is_overdue => format!("{}d late", -d),
        Some(d) => format!("in {}d", d),
        None => "-".to_string(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_records(backends: &Backends, filter: &RecordFilter, json: bool) -> Result<()> {
    if let Some(id) = &filter.module {
        if module_by_id(id).is_none() {
            bail!("Unknown module: '{}'", id);
        }
    }

    let snapshot = backends.snapshot().await?;
    let records: Vec<&QmsRecord> = snapshot.records.iter().filter(|r| filter.matches(r)).collect();

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No records.");
        return Ok(());
    }

    println!(
        "{:<10} {:<36} {:<14} {:>5} {:>4} {:>4} {:<10} {:<10}",
        "CODE", "NAME", "FREQUENCY", "FILES", "OK", "PEND", "STATUS", "NEXT FILL"
    );
    println!("{}", "-".repeat(102));
    for r in &records {
        let tally = r.file_tally();
        println!(
            "{:<10} {:<36} {:<14} {:>5} {:>4} {:>4} {:<10} {:<10}",
            r.template.code,
            truncate(&r.template.name, 36),
            truncate(&r.template.frequency_label, 14),
            r.actual_record_count,
            tally.approved,
            tally.pending,
            r.audit_status.label(),
            days_cell(r)
        );
    }
    warn_incomplete(&snapshot);
    Ok(())
}

pub async fn run_show(backends: &Backends, code: &str, json: bool) -> Result<()> {
    let snapshot = backends.snapshot().await?;
    let record = snapshot.find(code)?;

    if json {
        return print_json(record);
    }

    println!("--- Record ---");
    println!("code:          {}", record.template.code);
    println!("name:          {}", record.template.name);
    println!("category:      {}", record.template.category);
    println!("frequency:     {}", record.template.frequency_label);
    println!("folder:        {}", record.template.folder_link);
    println!("row:           {}", record.template.source_row_index);
    println!("files:         {}{}", record.actual_record_count, if record.files_listed { "" } else { " (from sheet)" });
    println!("last filled:   {}", non_empty(&record.last_file_date));
    println!("next fill:     {}", days_cell(record));
    println!(
        "status:        {}{}",
        record.audit_status.label(),
        record
            .audit_status_by
            .as_deref()
            .map(|by| format!(" by {} on {}", by, record.audit_status_date.as_deref().unwrap_or("?")))
            .unwrap_or_default()
    );
    if record.reviewed {
        println!("reviewed:      by {} on {}", record.reviewed_by, record.review_date);
    }
    println!();

    println!("--- Files ({}) ---", record.files.len());
    for file in &record.files {
        let review = record.review(&file.id);
        println!(
            "[{}] {}  {}",
            classify(review).label(),
            file.name,
            file.created_time.format("%Y-%m-%d")
        );
        println!("    id: {}", file.id);
        if let Some(review) = review.filter(|r| !r.comment.is_empty()) {
            println!("    comment: {}", review.comment);
        }
    }
    println!();
    Ok(())
}

pub async fn run_activity(backends: &Backends, limit: usize, json: bool) -> Result<()> {
    let snapshot = backends.snapshot().await?;
    let feed = activity_feed(&snapshot.records, limit, snapshot.taken_at);

    if json {
        return print_json(&feed);
    }

    if feed.is_empty() {
        println!("No activity.");
        return Ok(());
    }

    for entry in &feed {
        println!(
            "{:<9} {:<10} {:<36} {}",
            entry.kind.label(),
            entry.code,
            truncate(&entry.name, 36),
            entry.time_ago
        );
    }
    Ok(())
}

fn print_pending(title: &str, items: &[PendingItem]) {
    println!("{} ({})", title, items.len());
    for item in items {
        let days = item
            .days_until_next_fill
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<10} {:<36} {:<14} {:>5}",
            item.code,
            truncate(&item.name, 36),
            truncate(&item.frequency_label, 14),
            days
        );
    }
}

pub async fn run_pending(backends: &Backends, window_days: i64, json: bool) -> Result<()> {
    if window_days < 1 {
        bail!("--window must be >= 1");
    }
    let snapshot = backends.snapshot().await?;
    let actions = pending_actions(&snapshot.records, window_days);

    if json {
        return print_json(&actions);
    }

    if actions.is_empty() {
        println!("Nothing due in the next {} days.", window_days);
        return Ok(());
    }
    print_pending("Overdue", &actions.overdue);
    println!();
    print_pending(&format!("Due within {} days", window_days), &actions.upcoming);
    Ok(())
}

/// Which audit bucket(s) `qms audit` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuditBucketArg {
    All,
    Pending,
    Compliant,
    Issues,
}

fn print_items(title: &str, items: &[AuditItem]) {
    println!("{} ({})", title, items.len());
    for item in items {
        println!(
            "  {:<10} {:<40} {:<16} {}",
            item.code,
            truncate(&item.file_name, 40),
            item.reviewed_by,
            item.comment
        );
    }
}

pub async fn run_audit(backends: &Backends, bucket: AuditBucketArg, json: bool) -> Result<()> {
    let snapshot = backends.snapshot().await?;
    let buckets = audit_buckets(&snapshot.records);

    if json {
        return match bucket {
            AuditBucketArg::All => print_json(&buckets),
            AuditBucketArg::Pending => print_json(&buckets.pending),
            AuditBucketArg::Compliant => print_json(&buckets.compliant),
            AuditBucketArg::Issues => print_json(&buckets.issues),
        };
    }

    println!("Compliance rate: {}%", buckets.compliance_rate);
    println!();
    if matches!(bucket, AuditBucketArg::All | AuditBucketArg::Pending) {
        print_items("Pending review", &buckets.pending);
        println!();
    }
    if matches!(bucket, AuditBucketArg::All | AuditBucketArg::Compliant) {
        print_items("Compliant", &buckets.compliant);
        println!();
    }
    if matches!(bucket, AuditBucketArg::All | AuditBucketArg::Issues) {
        print_items("Issues", &buckets.issues);
        println!();
    }
    Ok(())
}

fn non_empty(s: &str) -> &str {
    if s.trim().is_empty() {
        "never"
    } else {
        s
    }
}

/// Cut to `max` chars, marking the cut with `…`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
