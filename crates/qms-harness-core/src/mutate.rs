//! Status mutations and the cells they write back.
//!
//! Each mutation is a two-step pipeline:
//!
//! 1. compute the new review map or record fields ([`set_file_review`]),
//! 2. decide whether the record is promoted ([`evaluate_cascade`]).
//!
//! The result is a [`MutationPlan`]: the updated record plus the exact cell
//! writes that persist it. Nothing here touches a source. The plan is only
//! committed once every write succeeds (see [`crate::refresh::commit`]).
//!
//! ## File state machine
//!
//! ```text
//!   pending_review ⇄ approved
//!   pending_review ⇄ rejected
//!         approved ⇄ rejected
//! ```
//!
//! Any actor may move any file to any assignable status. Approving the last
//! unapproved file of a record promotes the record to `Approved`, once.
//! Un-approving a file never demotes the record.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{QmsError, Result};
use crate::models::QmsRecord;
use crate::review::{set_review, RecordStatus, ReviewState, ReviewStatus};
use crate::sheet::Column;
use crate::timestamp::format_date;

/// One single-cell update against the tabular source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellWrite {
    /// 1-based row.
    pub row: u32,
    pub column: Column,
    pub value: String,
}

impl CellWrite {
    /// A1-style address, e.g. `P7`.
    pub fn address(&self) -> String {
        format!("{}{}", self.column.letter(), self.row)
    }
}

impl fmt::Display for CellWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:?}", self.address(), self.value)
    }
}

/// An uncommitted mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    pub record: QmsRecord,
    pub writes: Vec<CellWrite>,
    /// True when this mutation promoted the record to `Approved`.
    pub cascaded: bool,
}

/// Set one file's review, returning the updated review map.
///
/// The file must be listed on the record or already have a review entry.
pub fn set_file_review(
    record: &QmsRecord,
    file_id: &str,
    status: &str,
    comment: Option<&str>,
    reviewer: Option<&str>,
    review_date: Option<&str>,
) -> Result<BTreeMap<String, ReviewState>> {
    if record.file(file_id).is_none() && record.review(file_id).is_none() {
        return Err(QmsError::UnknownFile {
            code: record.template.code.clone(),
            file_id: file_id.to_string(),
        });
    }
    let next = set_review(record.review(file_id), status, comment, reviewer, review_date)?;
    let mut reviews = record.file_reviews.clone();
    reviews.insert(file_id.to_string(), next);
    Ok(reviews)
}

/// Should this record be promoted to `Approved`?
///
/// True when it has at least one listed file, every listed file is
/// approved, and the record is not already approved.
pub fn evaluate_cascade(record: &QmsRecord) -> bool {
    if record.audit_status == RecordStatus::Approved || record.files.is_empty() {
        return false;
    }
    record
        .files
        .iter()
        .all(|f| record.review(&f.id).map(|r| r.status) == Some(ReviewStatus::Approved))
}

fn ledger_write(record: &QmsRecord) -> CellWrite {
    CellWrite {
        row: record.template.source_row_index,
        column: Column::ReviewLedger,
        value: record.ledger().encode(),
    }
}

/// Review one file, cascading to the record when it completes approval.
pub fn apply_file_review(
    record: &QmsRecord,
    file_id: &str,
    status: &str,
    comment: Option<&str>,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<MutationPlan> {
    let today = format_date(&now);
    let reviews = set_file_review(record, file_id, status, comment, Some(actor), Some(&today))?;

    let mut next = record.clone();
    next.file_reviews = reviews;
    next.ledger_extra.remove(file_id);

    let approved = next.review(file_id).map(|r| r.status) == Some(ReviewStatus::Approved);
    let cascaded = approved && evaluate_cascade(&next);
    if cascaded {
        info!(code = %next.template.code, actor, "all files approved, promoting record");
        next.audit_status = RecordStatus::Approved;
        next.audit_status_by = Some(actor.to_string());
        next.audit_status_date = Some(today);
    }

    let writes = vec![ledger_write(&next)];
    Ok(MutationPlan {
        record: next,
        writes,
        cascaded,
    })
}

/// Set the record-level status directly. File reviews are left untouched.
pub fn set_record_status(
    record: &QmsRecord,
    status: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<MutationPlan> {
    let status: RecordStatus = status.parse()?;

    let mut next = record.clone();
    next.audit_status = status;
    next.audit_status_by = Some(actor.to_string());
    next.audit_status_date = Some(format_date(&now));

    let writes = vec![ledger_write(&next)];
    Ok(MutationPlan {
        record: next,
        writes,
        cascaded: false,
    })
}

/// Tick or clear the record's manual "reviewed" override.
pub fn set_record_reviewed(
    record: &QmsRecord,
    checked: bool,
    actor: &str,
    now: DateTime<Utc>,
) -> MutationPlan {
    let mut next = record.clone();
    next.reviewed = checked;
    if checked {
        next.reviewed_by = actor.to_string();
        next.review_date = format_date(&now);
    } else {
        next.reviewed_by.clear();
        next.review_date.clear();
    }

    let row = next.template.source_row_index;
    let writes = vec![
        CellWrite {
            row,
            column: Column::Reviewed,
            value: if checked { "TRUE" } else { "FALSE" }.to_string(),
        },
        CellWrite {
            row,
            column: Column::ReviewedBy,
            value: next.reviewed_by.clone(),
        },
        CellWrite {
            row,
            column: Column::ReviewDate,
            value: next.review_date.clone(),
        },
    ];
    MutationPlan {
        record: next,
        writes,
        cascaded: false,
    }
}
