//! Core data models.
//!
//! [`FormTemplate`] and [`FileArtifact`] are the two independently sourced
//! inputs; [`QmsRecord`] is the merged, denormalized view produced by
//! [`crate::merge`]. Records are rebuilt from scratch on every refresh.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::review::{classify, RecordStatus, ReviewBucket, ReviewLedger, ReviewState};

/// One catalog entry from the tabular source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormTemplate {
    /// Stable identity, `<letters>/<digits>` (e.g. `F/12`).
    pub code: String,
    pub category: String,
    pub name: String,
    pub description: String,
    pub frequency_label: String,
    pub template_link: String,
    pub folder_link: String,
    /// 1-based row in the tabular source; only used for write-back.
    pub source_row_index: u32,
}

/// One filled instance listed from a template's folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileArtifact {
    pub id: String,
    pub name: String,
    pub view_link: String,
    pub created_time: DateTime<Utc>,
    pub mime_type: String,
}

/// Per-template values recorded in the tabular source alongside the template.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetFacts {
    pub last_serial: String,
    pub last_file_date: String,
    pub days_ago: String,
    pub next_serial: String,
    pub audit_label: String,
    pub reviewed: bool,
    pub reviewed_by: String,
    pub review_date: String,
}

/// Approved / pending / rejected counts over a record's listed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FileTally {
    pub approved: u32,
    pub pending: u32,
    pub rejected: u32,
}

impl FileTally {
    pub fn total(&self) -> u32 {
        self.approved + self.pending + self.rejected
    }
}

impl std::ops::AddAssign for FileTally {
    fn add_assign(&mut self, rhs: FileTally) {
        self.approved += rhs.approved;
        self.pending += rhs.pending;
        self.rejected += rhs.rejected;
    }
}

/// The merged per-form view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QmsRecord {
    #[serde(flatten)]
    pub template: FormTemplate,
    pub files: Vec<FileArtifact>,
    /// False when the folder could not be listed and counts come from the sheet.
    pub files_listed: bool,
    pub file_reviews: BTreeMap<String, ReviewState>,
    /// Ledger entries that are not review states, re-emitted on write.
    #[serde(skip)]
    pub ledger_extra: Map<String, Value>,
    pub actual_record_count: u32,
    pub last_file_date: String,
    pub last_serial: String,
    pub next_serial: String,
    pub days_ago: String,
    pub sheet_audit_label: String,
    pub audit_status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_status_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_status_date: Option<String>,
    pub reviewed: bool,
    pub reviewed_by: String,
    pub review_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_until_next_fill: Option<i64>,
    pub is_overdue: bool,
}

impl QmsRecord {
    pub fn code(&self) -> &str {
        &self.template.code
    }

    pub fn file(&self, file_id: &str) -> Option<&FileArtifact> {
        self.files.iter().find(|f| f.id == file_id)
    }

    pub fn review(&self, file_id: &str) -> Option<&ReviewState> {
        self.file_reviews.get(file_id)
    }

    /// Bucket every listed file by its review status.
    pub fn file_tally(&self) -> FileTally {
        let mut tally = FileTally::default();
        for file in &self.files {
            match classify(self.review(&file.id)) {
                ReviewBucket::Approved => tally.approved += 1,
                ReviewBucket::Pending => tally.pending += 1,
                ReviewBucket::Rejected => tally.rejected += 1,
            }
        }
        tally
    }

    /// Rebuild the stored ledger from this record's review state.
    pub fn ledger(&self) -> ReviewLedger {
        ReviewLedger {
            record_status: self.audit_status,
            record_reviewed_by: self.audit_status_by.clone(),
            record_review_date: self.audit_status_date.clone(),
            files: self.file_reviews.clone(),
            extra: self.ledger_extra.clone(),
        }
    }
}
