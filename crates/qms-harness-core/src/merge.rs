//! Record merger: one template row + its folder listing → one [`QmsRecord`].
//!
//! # Rules
//!
//! | Field | Source |
//! |-------|--------|
//! | `file_reviews` | review ledger, malformed blob → empty |
//! | `actual_record_count` | `files.len()`, else `max(sheet_fallback_count, 0)` |
//! | `last_file_date` | newest `created_time`, else the sheet's stored date |
//! | `audit_status` | ledger `recordStatus`, default `Pending` |
//! | `reviewed*` | sheet override columns, untouched by file state |
//! | schedule | [`compute_schedule`] over frequency label + `last_file_date` |
//!
//! The merge is a pure function of its inputs: the same inputs always
//! produce an identical record.

use chrono::{DateTime, Utc};

use crate::models::{FileArtifact, FormTemplate, QmsRecord, SheetFacts};
use crate::review::{RawLedger, ReviewLedger};
use crate::schedule::compute_schedule;
use crate::sheet::SheetRow;
use crate::timestamp::format_rfc3339;

/// Merge one template with its file listing.
///
/// `files` is `None` when the folder was not listed (no folder, or the
/// document store failed); `Some(&[])` is a listing that came back empty.
/// Either way the sheet's recorded count is kept rather than zeroed.
pub fn merge(
    template: &FormTemplate,
    files: Option<&[FileArtifact]>,
    review_blob: RawLedger<'_>,
    sheet_fallback_count: i64,
    facts: &SheetFacts,
    now: DateTime<Utc>,
) -> QmsRecord {
    let ledger = ReviewLedger::decode(review_blob);
    let listed = files.unwrap_or_default();

    let actual_record_count = if listed.is_empty() {
        u32::try_from(sheet_fallback_count.max(0)).unwrap_or(u32::MAX)
    } else {
        u32::try_from(listed.len()).unwrap_or(u32::MAX)
    };

    let last_file_date = listed
        .iter()
        .map(|f| f.created_time)
        .max()
        .map(|t| format_rfc3339(&t))
        .unwrap_or_else(|| facts.last_file_date.clone());

    let last_activity = Some(last_file_date.as_str()).filter(|s| !s.trim().is_empty());
    let schedule = compute_schedule(&template.frequency_label, last_activity, now);

    QmsRecord {
        template: template.clone(),
        files: listed.to_vec(),
        files_listed: files.is_some(),
        file_reviews: ledger.files,
        ledger_extra: ledger.extra,
        actual_record_count,
        last_file_date,
        last_serial: facts.last_serial.clone(),
        next_serial: facts.next_serial.clone(),
        days_ago: facts.days_ago.clone(),
        sheet_audit_label: facts.audit_label.clone(),
        audit_status: ledger.record_status,
        audit_status_by: ledger.record_reviewed_by,
        audit_status_date: ledger.record_review_date,
        reviewed: facts.reviewed,
        reviewed_by: facts.reviewed_by.clone(),
        review_date: facts.review_date.clone(),
        days_until_next_fill: schedule.days_until_next_fill,
        is_overdue: schedule.is_overdue,
    }
}

/// Merge a decoded sheet row.
pub fn merge_row(row: &SheetRow, files: Option<&[FileArtifact]>, now: DateTime<Utc>) -> QmsRecord {
    merge(
        &row.template,
        files,
        RawLedger::from(&row.review_blob),
        row.fallback_count,
        &row.facts,
        now,
    )
}
