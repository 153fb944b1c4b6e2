//! Read models folded from a snapshot of merged records.
//!
//! Every function here is a pure fold over `&[QmsRecord]`. Nothing is
//! cached or persisted; callers recompute after each refresh or mutation.
//! Missing or unparseable dates exclude a record from date-sensitive
//! calculations and are never treated as errors.
//!
//! # Compliance rate
//!
//! ```text
//! rate = round(100 * approved / (approved + pending))     0 when empty
//! ```
//!
//! Rejected files count toward neither side of the ratio.

use std::cmp::Reverse;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{FileTally, QmsRecord};
use crate::review::{classify, ReviewBucket, ReviewStatus};
use crate::sheet::NO_FILES_SENTINEL;
use crate::taxonomy::{normalize_audit_status, normalize_category, AuditClass};
use crate::timestamp::{format_time_ago, parse_timestamp};

/// Round half away from negative infinity, matching the dashboard's
/// `Math.round`.
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Percentage of approved files among approved + pending.
pub fn compliance_rate(approved: u32, pending: u32) -> u32 {
    let total = approved + pending;
    if total == 0 {
        return 0;
    }
    round_half_up(100.0 * f64::from(approved) / f64::from(total)).clamp(0, 100) as u32
}

/// Coarse audit class of a record's record-level status.
pub fn record_audit_class(record: &QmsRecord) -> AuditClass {
    normalize_audit_status(record.audit_status.label())
}

// ============================================================================
// Module stats
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStats {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(skip)]
    pub order: u8,
    /// Templates mapped to this module.
    pub forms_count: u32,
    /// Files listed across those templates.
    pub records_count: u32,
    /// Files neither approved nor rejected.
    pub pending_count: u32,
    /// Templates whose record-level status is an issue.
    pub issues_count: u32,
}

/// Group records by module. Unmapped categories are dropped; output is in
/// module display order and only contains modules with at least one form.
pub fn module_stats(records: &[QmsRecord]) -> Vec<ModuleStats> {
    let mut stats: Vec<ModuleStats> = Vec::new();

    for record in records {
        let Some(module) = normalize_category(&record.template.category) else {
            continue;
        };
        let idx = match stats.iter().position(|s| s.id == module.id) {
            Some(idx) => idx,
            None => {
                stats.push(ModuleStats {
                    id: module.id,
                    name: module.name,
                    order: module.order,
                    forms_count: 0,
                    records_count: 0,
                    pending_count: 0,
                    issues_count: 0,
                });
                stats.len() - 1
            }
        };

        let entry = &mut stats[idx];
        let tally = record.file_tally();
        entry.forms_count += 1;
        entry.records_count += tally.total();
        entry.pending_count += tally.pending;
        if record_audit_class(record) == AuditClass::Issue {
            entry.issues_count += 1;
        }
    }

    stats.sort_by_key(|s| s.order);
    stats
}

// ============================================================================
// Audit / review summaries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    /// Number of templates.
    pub total: u32,
    /// Approved files.
    pub compliant: u32,
    /// Files awaiting review.
    pub pending: u32,
    /// Templates flagged as nonconforming.
    pub issues: u32,
    pub compliance_rate: u32,
}

fn tally_all(records: &[QmsRecord]) -> FileTally {
    let mut total = FileTally::default();
    for record in records {
        total += record.file_tally();
    }
    total
}

pub fn audit_summary(records: &[QmsRecord]) -> AuditSummary {
    let tally = tally_all(records);
    let issues = records
        .iter()
        .filter(|r| record_audit_class(r) == AuditClass::Issue)
        .count() as u32;
    AuditSummary {
        total: records.len() as u32,
        compliant: tally.approved,
        pending: tally.pending,
        issues,
        compliance_rate: compliance_rate(tally.approved, tally.pending),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub completed: u32,
    pub pending: u32,
    pub total: u32,
}

pub fn review_summary(records: &[QmsRecord]) -> ReviewSummary {
    let tally = tally_all(records);
    ReviewSummary {
        completed: tally.approved,
        pending: tally.pending,
        total: records.len() as u32,
    }
}

// ============================================================================
// Monthly comparison
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyComparison {
    /// Records whose last file falls within the last 30 days.
    pub current_month: u32,
    /// Records whose last file is 30 to 60 days old.
    pub previous_month: u32,
    /// Magnitude of the change, in percent.
    pub percentage_change: u32,
    pub is_positive: bool,
}

pub fn monthly_comparison(records: &[QmsRecord], now: DateTime<Utc>) -> MonthlyComparison {
    let thirty_days_ago = now - Duration::days(30);
    let sixty_days_ago = now - Duration::days(60);

    let mut current = 0u32;
    let mut previous = 0u32;
    for record in records {
        let Some(date) = parse_timestamp(&record.last_file_date) else {
            continue;
        };
        if date >= thirty_days_ago {
            current += 1;
        } else if date >= sixty_days_ago {
            previous += 1;
        }
    }

    let change = if previous > 0 {
        round_half_up(100.0 * (f64::from(current) - f64::from(previous)) / f64::from(previous))
    } else if current > 0 {
        100
    } else {
        0
    };

    MonthlyComparison {
        current_month: current,
        previous_month: previous,
        percentage_change: change.unsigned_abs() as u32,
        is_positive: change >= 0,
    }
}

// ============================================================================
// Recent activity
// ============================================================================

/// Most recently active records first. Records without a parseable
/// `last_file_date` sort last, keeping their input order.
pub fn recent_activity(records: &[QmsRecord], limit: usize) -> Vec<&QmsRecord> {
    let mut sorted: Vec<(Option<DateTime<Utc>>, &QmsRecord)> = records
        .iter()
        .map(|r| (parse_timestamp(&r.last_file_date), r))
        .collect();
    sorted.sort_by_key(|(date, _)| (date.is_none(), Reverse(*date)));
    sorted.into_iter().take(limit).map(|(_, r)| r).collect()
}

/// What a record's latest state looks like in an activity feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    Approved,
    Pending,
    Issue,
}

impl ActivityKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Created => "Created",
            ActivityKind::Approved => "Approved",
            ActivityKind::Pending => "Pending",
            ActivityKind::Issue => "Issue",
        }
    }
}

pub fn activity_kind(record: &QmsRecord) -> ActivityKind {
    let any_approved = record
        .file_reviews
        .values()
        .any(|r| r.status == ReviewStatus::Approved);
    if record.reviewed || any_approved {
        return ActivityKind::Approved;
    }
    if record_audit_class(record) == AuditClass::Issue {
        return ActivityKind::Issue;
    }
    let serial = record.last_serial.trim();
    let has_serial = !serial.is_empty() && !serial.to_lowercase().contains(NO_FILES_SENTINEL);
    if record.actual_record_count > 0 || has_serial {
        return ActivityKind::Pending;
    }
    ActivityKind::Created
}

/// One line of the activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub code: String,
    pub name: String,
    pub module: Option<&'static str>,
    pub last_file_date: String,
    pub time_ago: String,
    pub kind: ActivityKind,
    pub reviewed_by: String,
}

pub fn activity_feed(records: &[QmsRecord], limit: usize, now: DateTime<Utc>) -> Vec<ActivityEntry> {
    recent_activity(records, limit)
        .into_iter()
        .map(|r| ActivityEntry {
            code: r.template.code.clone(),
            name: r.template.name.clone(),
            module: normalize_category(&r.template.category).map(|m| m.name),
            last_file_date: r.last_file_date.clone(),
            time_ago: format_time_ago(&r.last_file_date, now),
            kind: activity_kind(r),
            reviewed_by: r.reviewed_by.clone(),
        })
        .collect()
}

// ============================================================================
// Pending actions
// ============================================================================

/// Default look-ahead for upcoming fills, in days.
pub const DEFAULT_UPCOMING_WINDOW: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingItem {
    pub code: String,
    pub name: String,
    pub module_id: Option<&'static str>,
    pub frequency_label: String,
    pub days_until_next_fill: Option<i64>,
}

impl PendingItem {
    fn from_record(record: &QmsRecord) -> Self {
        PendingItem {
            code: record.template.code.clone(),
            name: record.template.name.clone(),
            module_id: normalize_category(&record.template.category).map(|m| m.id),
            frequency_label: record.template.frequency_label.clone(),
            days_until_next_fill: record.days_until_next_fill,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PendingActions {
    pub overdue: Vec<PendingItem>,
    pub upcoming: Vec<PendingItem>,
}

impl PendingActions {
    pub fn is_empty(&self) -> bool {
        self.overdue.is_empty() && self.upcoming.is_empty()
    }
}

/// Overdue records, and records due within `1..=window_days`.
pub fn pending_actions(records: &[QmsRecord], window_days: i64) -> PendingActions {
    let mut actions = PendingActions::default();
    for record in records {
        if record.is_overdue {
            actions.overdue.push(PendingItem::from_record(record));
        } else if record
            .days_until_next_fill
            .is_some_and(|d| d > 0 && d <= window_days)
        {
            actions.upcoming.push(PendingItem::from_record(record));
        }
    }
    actions
}

// ============================================================================
// File audit buckets
// ============================================================================

/// One listed file with its review, for the audit view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditItem {
    pub code: String,
    pub name: String,
    pub category: String,
    pub file_id: String,
    pub file_name: String,
    pub file_link: String,
    pub status: ReviewStatus,
    pub comment: String,
    /// File reviewer, falling back to the record's manual reviewer.
    pub reviewed_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditBuckets {
    pub pending: Vec<AuditItem>,
    pub compliant: Vec<AuditItem>,
    pub issues: Vec<AuditItem>,
    pub compliance_rate: u32,
}

pub fn audit_buckets(records: &[QmsRecord]) -> AuditBuckets {
    let mut buckets = AuditBuckets::default();
    for record in records {
        for file in &record.files {
            let review = record.review(&file.id);
            let item = AuditItem {
                code: record.template.code.clone(),
                name: record.template.name.clone(),
                category: record.template.category.clone(),
                file_id: file.id.clone(),
                file_name: file.name.clone(),
                file_link: file.view_link.clone(),
                status: review.map(|r| r.status).unwrap_or_default(),
                comment: review.map(|r| r.comment.clone()).unwrap_or_default(),
                reviewed_by: review
                    .and_then(|r| r.reviewed_by.clone())
                    .unwrap_or_else(|| record.reviewed_by.clone()),
            };
            match classify(review) {
                ReviewBucket::Approved => buckets.compliant.push(item),
                ReviewBucket::Rejected => buckets.issues.push(item),
                ReviewBucket::Pending => buckets.pending.push(item),
            }
        }
    }
    buckets.compliance_rate =
        compliance_rate(buckets.compliant.len() as u32, buckets.pending.len() as u32);
    buckets
}

// ============================================================================
// Module readiness
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    Compliant,
    Pending,
    Attention,
}

impl ReadinessStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReadinessStatus::Compliant => "Compliant",
            ReadinessStatus::Pending => "In Progress",
            ReadinessStatus::Attention => "Needs Attention",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleReadiness {
    pub id: &'static str,
    pub name: &'static str,
    pub status: ReadinessStatus,
    pub progress: u32,
}

pub fn module_readiness(stats: &ModuleStats) -> ModuleReadiness {
    let status = if stats.issues_count > 0 {
        ReadinessStatus::Attention
    } else if stats.pending_count > 0 {
        ReadinessStatus::Pending
    } else {
        ReadinessStatus::Compliant
    };

    let progress = if stats.forms_count == 0 || stats.records_count == 0 {
        0
    } else {
        let ready = i64::from(stats.forms_count)
            - i64::from(stats.issues_count)
            - i64::from(stats.pending_count);
        let ratio = ready.max(0) as f64 / f64::from(stats.forms_count);
        round_half_up(100.0 * ratio) as u32
    };

    ModuleReadiness {
        id: stats.id,
        name: stats.name,
        status,
        progress,
    }
}
