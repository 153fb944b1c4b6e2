//! Per-file review state, record-level status, and the review ledger.
//!
//! The tabular source keeps every review for one template in a single
//! cell. [`ReviewLedger`] is the typed form of that cell: it is decoded
//! once at the source boundary and re-encoded only when writing back.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "1AbC": { "status": "approved", "comment": "", "reviewedBy": "Mona", "reviewDate": "2024-06-01" },
//!   "9XyZ": { "status": "pending_review", "comment": "missing signature" },
//!   "recordStatus": "approved",
//!   "recordReviewedBy": "Mona",
//!   "recordReviewDate": "2024-06-01"
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{QmsError, Result};

const KEY_RECORD_STATUS: &str = "recordStatus";
const KEY_RECORD_REVIEWED_BY: &str = "recordReviewedBy";
const KEY_RECORD_REVIEW_DATE: &str = "recordReviewDate";

// ============================================================================
// ReviewStatus - per-file workflow status
// ============================================================================

/// Workflow status of one file artifact.
///
/// `Draft` exists for compatibility with stored data; the engine never
/// assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Draft,
    #[default]
    #[serde(alias = "pending")]
    PendingReview,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Draft => "draft",
            ReviewStatus::PendingReview => "pending_review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    /// Parse a status an actor is allowed to assign.
    ///
    /// Accepts `approved`, `rejected`, `pending_review` (or `pending`),
    /// case-insensitively. Everything else, `draft` included, is
    /// [`QmsError::InvalidStatus`].
    pub fn parse_assignable(raw: &str) -> Result<ReviewStatus> {
        match raw.parse::<ReviewStatus>() {
            Ok(ReviewStatus::Draft) | Err(_) => Err(QmsError::InvalidStatus(raw.to_string())),
            Ok(status) => Ok(status),
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = QmsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(ReviewStatus::Draft),
            "pending_review" | "pending" => Ok(ReviewStatus::PendingReview),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            _ => Err(QmsError::InvalidStatus(s.to_string())),
        }
    }
}

// ============================================================================
// RecordStatus - record-level aggregate
// ============================================================================

/// Record-level audit status, independent of any single file's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecordStatus {
    Approved,
    Rejected,
    #[default]
    Pending,
}

impl RecordStatus {
    /// Display label ("Approved", "Rejected", "Pending").
    pub fn label(&self) -> &'static str {
        match self {
            RecordStatus::Approved => "Approved",
            RecordStatus::Rejected => "Rejected",
            RecordStatus::Pending => "Pending",
        }
    }

    fn from_stored(status: ReviewStatus) -> RecordStatus {
        match status {
            ReviewStatus::Approved => RecordStatus::Approved,
            ReviewStatus::Rejected => RecordStatus::Rejected,
            ReviewStatus::Draft | ReviewStatus::PendingReview => RecordStatus::Pending,
        }
    }

    fn to_stored(self) -> ReviewStatus {
        match self {
            RecordStatus::Approved => ReviewStatus::Approved,
            RecordStatus::Rejected => ReviewStatus::Rejected,
            RecordStatus::Pending => ReviewStatus::PendingReview,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RecordStatus {
    type Err = QmsError;

    /// Accepts display labels and workflow statuses alike.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "approved" => Ok(RecordStatus::Approved),
            "rejected" => Ok(RecordStatus::Rejected),
            "pending" | "pending_review" => Ok(RecordStatus::Pending),
            _ => Err(QmsError::InvalidStatus(s.to_string())),
        }
    }
}

// ============================================================================
// ReviewState
// ============================================================================

/// Review of one file artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    #[serde(default)]
    pub status: ReviewStatus,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_date: Option<String>,
}

/// Display bucket a file falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewBucket {
    Pending,
    Approved,
    Rejected,
}

impl ReviewBucket {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewBucket::Pending => "pending",
            ReviewBucket::Approved => "approved",
            ReviewBucket::Rejected => "rejected",
        }
    }
}

/// Classify a file's review. A missing review is pending.
pub fn classify(review: Option<&ReviewState>) -> ReviewBucket {
    match review.map(|r| r.status) {
        Some(ReviewStatus::Approved) => ReviewBucket::Approved,
        Some(ReviewStatus::Rejected) => ReviewBucket::Rejected,
        _ => ReviewBucket::Pending,
    }
}

/// Merge a status change into a file's previous review.
///
/// Fields passed as `None` keep their previous value. The comment is not
/// validated.
pub fn set_review(
    previous: Option<&ReviewState>,
    status: &str,
    comment: Option<&str>,
    reviewer: Option<&str>,
    review_date: Option<&str>,
) -> Result<ReviewState> {
    let status = ReviewStatus::parse_assignable(status)?;
    let mut next = previous.cloned().unwrap_or_default();
    next.status = status;
    if let Some(c) = comment {
        next.comment = c.to_string();
    }
    if let Some(r) = reviewer {
        next.reviewed_by = Some(r.to_string());
    }
    if let Some(d) = review_date {
        next.review_date = Some(d.to_string());
    }
    Ok(next)
}

// ============================================================================
// ReviewLedger - the per-template review cell
// ============================================================================

/// All review metadata stored for one template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReviewLedger {
    pub record_status: RecordStatus,
    pub record_reviewed_by: Option<String>,
    pub record_review_date: Option<String>,
    pub files: BTreeMap<String, ReviewState>,
    /// Entries that are not review states (unknown statuses, foreign keys).
    /// Carried through untouched so a write never erases them.
    pub extra: Map<String, Value>,
}

/// Raw ledger as supplied by a source: a cell string or already-parsed JSON.
#[derive(Debug, Clone, Copy)]
pub enum RawLedger<'a> {
    Text(&'a str),
    Json(&'a Value),
}

impl<'a> From<&'a str> for RawLedger<'a> {
    fn from(s: &'a str) -> Self {
        RawLedger::Text(s)
    }
}

impl<'a> From<&'a String> for RawLedger<'a> {
    fn from(s: &'a String) -> Self {
        RawLedger::Text(s.as_str())
    }
}

impl<'a> From<&'a Value> for RawLedger<'a> {
    fn from(v: &'a Value) -> Self {
        RawLedger::Json(v)
    }
}

impl ReviewLedger {
    /// Decode a raw ledger, recovering from malformed input.
    ///
    /// A blob that is not a JSON object yields an empty ledger (logged).
    /// Individual entries that do not decode land in
    /// [`extra`](Self::extra).
    pub fn decode(raw: RawLedger<'_>) -> ReviewLedger {
        match Self::try_decode(raw) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("ignoring review ledger: {}", e);
                ReviewLedger::default()
            }
        }
    }

    /// Strict variant of [`decode`](Self::decode) for callers that want to
    /// report a malformed blob instead of defaulting.
    pub fn try_decode(raw: RawLedger<'_>) -> Result<ReviewLedger> {
        let parsed;
        let value = match raw {
            RawLedger::Text(text) => {
                if text.trim().is_empty() {
                    return Ok(ReviewLedger::default());
                }
                parsed = serde_json::from_str::<Value>(text).map_err(|e| {
                    QmsError::MalformedData {
                        what: "review ledger",
                        detail: e.to_string(),
                    }
                })?;
                &parsed
            }
            RawLedger::Json(value) => value,
        };

        let obj = match value {
            Value::Object(obj) => obj,
            Value::Null => return Ok(ReviewLedger::default()),
            other => {
                return Err(QmsError::MalformedData {
                    what: "review ledger",
                    detail: format!("expected an object, found {}", json_kind(other)),
                })
            }
        };

        let mut ledger = ReviewLedger::default();
        for (key, entry) in obj {
            match key.as_str() {
                KEY_RECORD_STATUS => {
                    ledger.record_status = entry
                        .as_str()
                        .and_then(|s| s.parse::<ReviewStatus>().ok())
                        .map(RecordStatus::from_stored)
                        .unwrap_or_default();
                }
                KEY_RECORD_REVIEWED_BY => {
                    ledger.record_reviewed_by = non_empty_str(entry);
                }
                KEY_RECORD_REVIEW_DATE => {
                    ledger.record_review_date = non_empty_str(entry);
                }
                file_id => match serde_json::from_value::<ReviewState>(entry.clone()) {
                    Ok(state) => {
                        ledger.files.insert(file_id.to_string(), state);
                    }
                    Err(e) => {
                        warn!("keeping undecodable review entry {} as-is: {}", file_id, e);
                        ledger.extra.insert(file_id.to_string(), entry.clone());
                    }
                },
            }
        }
        Ok(ledger)
    }

    /// Encode for storage in the tabular source.
    pub fn encode(&self) -> String {
        let mut obj = self.extra.clone();
        for (file_id, state) in &self.files {
            if let Ok(v) = serde_json::to_value(state) {
                obj.insert(file_id.clone(), v);
            }
        }
        obj.insert(
            KEY_RECORD_STATUS.to_string(),
            Value::String(self.record_status.to_stored().as_str().to_string()),
        );
        if let Some(by) = &self.record_reviewed_by {
            obj.insert(KEY_RECORD_REVIEWED_BY.to_string(), Value::String(by.clone()));
        }
        if let Some(date) = &self.record_review_date {
            obj.insert(KEY_RECORD_REVIEW_DATE.to_string(), Value::String(date.clone()));
        }
        Value::Object(obj).to_string()
    }
}

fn non_empty_str(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
