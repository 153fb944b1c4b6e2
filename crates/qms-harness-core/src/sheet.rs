//! Fixed column layout of the tabular source.
//!
//! | Col | Index | Meaning |
//! |-----|-------|---------|
//! | A | 0 | category |
//! | B | 1 | code |
//! | C | 2 | name |
//! | D | 3 | description |
//! | E | 4 | frequency label ("when to fill") |
//! | F | 5 | template link |
//! | G | 6 | folder link |
//! | H | 7 | last serial |
//! | I | 8 | last file date |
//! | J | 9 | days-ago label |
//! | K | 10 | next serial |
//! | L | 11 | audit-status label, may embed "(N files)" |
//! | M | 12 | reviewer note |
//! | N | 13 | reviewed by |
//! | O | 14 | review date |
//! | P | 15 | review ledger (JSON) |
//! | R | 17 | reviewed flag (`TRUE`/`FALSE`) |
//!
//! Row 1 is the header. Rows whose code is empty, a "No Code" marker, a
//! folder header, or not shaped like a form code are skipped.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{QmsError, Result};
use crate::models::{FormTemplate, SheetFacts};

/// Columns the engine reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Column {
    Category,
    Code,
    Name,
    Description,
    Frequency,
    TemplateLink,
    FolderLink,
    LastSerial,
    LastFileDate,
    DaysAgo,
    NextSerial,
    AuditLabel,
    ReviewerNote,
    ReviewedBy,
    ReviewDate,
    ReviewLedger,
    Reviewed,
}

impl Column {
    pub fn index(self) -> usize {
        match self {
            Column::Category => 0,
            Column::Code => 1,
            Column::Name => 2,
            Column::Description => 3,
            Column::Frequency => 4,
            Column::TemplateLink => 5,
            Column::FolderLink => 6,
            Column::LastSerial => 7,
            Column::LastFileDate => 8,
            Column::DaysAgo => 9,
            Column::NextSerial => 10,
            Column::AuditLabel => 11,
            Column::ReviewerNote => 12,
            Column::ReviewedBy => 13,
            Column::ReviewDate => 14,
            Column::ReviewLedger => 15,
            Column::Reviewed => 17,
        }
    }

    /// Spreadsheet column letter (`A`..`R`).
    pub fn letter(self) -> char {
        (b'A' + self.index() as u8) as char
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Last column the engine reads, for range requests (`A:R`).
pub const LAST_COLUMN: Column = Column::Reviewed;

/// Sentinel used in serial and folder cells for templates with no instances.
pub const NO_FILES_SENTINEL: &str = "no files yet";

/// One decoded template row plus everything the sheet records about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub template: FormTemplate,
    pub facts: SheetFacts,
    pub review_blob: String,
    /// Count recorded in the sheet, used when the folder cannot be listed.
    pub fallback_count: i64,
}

/// Check a code against `<letters>/<digits>...` or all-digits.
pub fn is_valid_code(code: &str) -> bool {
    let code = code.trim();
    if code.is_empty() {
        return false;
    }
    if code.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    let Some((prefix, rest)) = code.split_once('/') else {
        return false;
    };
    !prefix.is_empty()
        && prefix.chars().all(|c| c.is_ascii_alphabetic())
        && rest.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Validate a code, reporting why it was rejected.
pub fn parse_code(raw: &str) -> Result<String> {
    let code = raw.trim();
    if code.contains("No Code") || code.contains('⚪') {
        return Err(QmsError::MalformedData {
            what: "form code",
            detail: format!("'{}' is a no-code marker", code),
        });
    }
    if code.contains('📂') || code.contains("Folder") {
        return Err(QmsError::MalformedData {
            what: "form code",
            detail: format!("'{}' is a folder header", code),
        });
    }
    if !is_valid_code(code) {
        return Err(QmsError::MalformedData {
            what: "form code",
            detail: format!("'{}' does not look like a form code", code),
        });
    }
    Ok(code.to_string())
}

/// True when a folder link points at something worth listing.
pub fn is_listable_folder(link: &str) -> bool {
    let trimmed = link.trim();
    !trimmed.is_empty() && !trimmed.to_lowercase().contains(NO_FILES_SENTINEL)
}

/// Count recorded by the sheet: "(N files)" in the audit label, else 1 when a
/// real serial exists, else 0.
pub fn parse_fallback_count(audit_label: &str, last_serial: &str) -> i64 {
    if let Some(n) = files_suffix_count(audit_label) {
        if n > 0 {
            return n;
        }
    }
    let serial = last_serial.trim();
    if !serial.is_empty() && !serial.to_lowercase().contains(NO_FILES_SENTINEL) {
        return 1;
    }
    0
}

/// Extract `N` from a "(N file)" / "(N files)" fragment.
fn files_suffix_count(label: &str) -> Option<i64> {
    let lower = label.to_lowercase();
    let mut rest = lower.as_str();
    while let Some(open) = rest.find('(') {
        let inner = &rest[open + 1..];
        let digits: String = inner.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            let tail = inner[digits.len()..].trim_start();
            if tail.starts_with("file") {
                let after = tail.trim_start_matches("files").trim_start_matches("file");
                if after.trim_start().starts_with(')') {
                    return digits.parse().ok();
                }
            }
        }
        rest = inner;
    }
    None
}

fn cell(row: &[String], column: Column) -> String {
    row.get(column.index())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Decode one data row. `row_index` is the 1-based sheet row.
pub fn decode_row(row: &[String], row_index: u32) -> Result<SheetRow> {
    let code = parse_code(&cell(row, Column::Code))?;

    let template = FormTemplate {
        code,
        category: cell(row, Column::Category),
        name: cell(row, Column::Name),
        description: cell(row, Column::Description),
        frequency_label: cell(row, Column::Frequency),
        template_link: cell(row, Column::TemplateLink),
        folder_link: cell(row, Column::FolderLink),
        source_row_index: row_index,
    };

    let facts = SheetFacts {
        last_serial: cell(row, Column::LastSerial),
        last_file_date: cell(row, Column::LastFileDate),
        days_ago: cell(row, Column::DaysAgo),
        next_serial: cell(row, Column::NextSerial),
        audit_label: cell(row, Column::AuditLabel),
        reviewed: cell(row, Column::Reviewed).eq_ignore_ascii_case("true"),
        reviewed_by: cell(row, Column::ReviewedBy),
        review_date: cell(row, Column::ReviewDate),
    };

    let fallback_count = parse_fallback_count(&facts.audit_label, &facts.last_serial);

    Ok(SheetRow {
        template,
        review_blob: cell(row, Column::ReviewLedger),
        fallback_count,
        facts,
    })
}

/// Decode every data row, skipping the header and anything that is not a
/// form template.
pub fn decode_rows(rows: &[Vec<String>]) -> Vec<SheetRow> {
    rows.iter()
        .enumerate()
        .skip(1)
        .filter_map(|(i, row)| match decode_row(row, i as u32 + 1) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!("skipping sheet row {}: {}", i + 1, e);
                None
            }
        })
        .collect()
}
