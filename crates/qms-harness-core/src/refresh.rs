//! Snapshot loading and write-plan commit.
//!
//! A refresh reads every row, decodes the templates, lists all listable
//! folders in one batch, and merges. A failing tabular source aborts the
//! refresh; a failing folder only degrades that record to the count the
//! sheet recorded, and the folder is reported in
//! [`Snapshot::unavailable_folders`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{QmsError, Result};
use crate::merge::merge_row;
use crate::models::QmsRecord;
use crate::mutate::MutationPlan;
use crate::sheet::{decode_rows, is_listable_folder};
use crate::store::{DocumentStore, TabularSource};

/// Records built from one read of both sources.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub records: Vec<QmsRecord>,
    /// Folder links that should have been listed but could not be.
    pub unavailable_folders: Vec<String>,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// True when every listable folder was listed.
    pub fn is_complete(&self) -> bool {
        self.unavailable_folders.is_empty()
    }

    pub fn find(&self, code: &str) -> Result<&QmsRecord> {
        self.records
            .iter()
            .find(|r| r.template.code == code)
            .ok_or_else(|| QmsError::UnknownRecord(code.to_string()))
    }
}

pub async fn load_snapshot(
    tabular: &dyn TabularSource,
    documents: &dyn DocumentStore,
    now: DateTime<Utc>,
) -> Result<Snapshot> {
    let rows = tabular.read_rows().await?;
    let decoded = decode_rows(&rows);
    debug!(
        source = tabular.name(),
        rows = rows.len(),
        templates = decoded.len(),
        "decoded sheet"
    );

    let links: Vec<String> = decoded
        .iter()
        .map(|r| r.template.folder_link.trim().to_string())
        .filter(|l| is_listable_folder(l))
        .collect();
    let listings = documents.batch_list_files(&links).await;

    let unavailable_folders: Vec<String> = links
        .iter()
        .filter(|l| !listings.contains_key(l.as_str()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !unavailable_folders.is_empty() {
        warn!(
            store = documents.name(),
            count = unavailable_folders.len(),
            "some folders could not be listed, using sheet counts"
        );
    }

    let records = decoded
        .iter()
        .map(|row| {
            let files = listings
                .get(row.template.folder_link.trim())
                .map(Vec::as_slice);
            merge_row(row, files, now)
        })
        .collect();

    Ok(Snapshot {
        records,
        unavailable_folders,
        taken_at: now,
    })
}

/// Apply a plan's writes in order. The first failure is returned as-is and
/// the plan's record must then be discarded.
pub async fn commit(tabular: &dyn TabularSource, plan: MutationPlan) -> Result<QmsRecord> {
    for cell in &plan.writes {
        tabular.update_cell(cell.row, cell.column, &cell.value).await?;
    }
    info!(
        code = %plan.record.template.code,
        writes = plan.writes.len(),
        cascaded = plan.cascaded,
        "mutation committed"
    );
    Ok(plan.record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{audit_summary, module_stats};
    use crate::models::FileArtifact;
    use crate::mutate::{apply_file_review, set_record_reviewed};
    use crate::review::RecordStatus;
    use crate::sheet::Column;
    use crate::store::memory::{InMemoryDocuments, InMemorySheet};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        let mut out: Vec<String> = cells.iter().map(|s| s.to_string()).collect();
        out.resize(18, String::new());
        out
    }

    fn template_row(category: &str, code: &str, freq: &str, folder: &str, audit: &str, blob: &str) -> Vec<String> {
        let mut cells = row(&[category, code, code, "", freq, "", folder]);
        cells[Column::AuditLabel.index()] = audit.to_string();
        cells[Column::ReviewLedger.index()] = blob.to_string();
        cells
    }

    fn artifact(id: &str, days_ago: i64) -> FileArtifact {
        FileArtifact {
            id: id.into(),
            name: format!("{}.pdf", id),
            view_link: String::new(),
            created_time: now() - Duration::days(days_ago),
            mime_type: "application/pdf".into(),
        }
    }

    fn fixture() -> (InMemorySheet, InMemoryDocuments) {
        let sheet = InMemorySheet::new(vec![
            row(&["Category", "Code", "Name"]),
            template_row(
                "02-Operations",
                "F/01",
                "Weekly",
                "ops-1",
                "",
                r#"{"a":{"status":"approved"},"b":{"status":"approved"}}"#,
            ),
            template_row("02-Operations", "F/02", "Monthly", "ops-2", "Pending (6 files)", ""),
            template_row("05-HR", "F/03", "As needed", "No Files Yet", "", ""),
            row(&["📂 HR", "📂 Folder"]),
        ]);
        let docs = InMemoryDocuments::new();
        docs.insert_folder("ops-1", vec![artifact("a", 9), artifact("b", 3), artifact("c", 2)]);
        docs.mark_unavailable("ops-2");
        (sheet, docs)
    }

    #[tokio::test]
    async fn snapshot_merges_and_reports_unlisted_folders() {
        let (sheet, docs) = fixture();
        let snap = load_snapshot(&sheet, &docs, now()).await.unwrap();

        assert_eq!(snap.records.len(), 3);
        assert!(!snap.is_complete());
        assert_eq!(snap.unavailable_folders, vec!["ops-2".to_string()]);

        let f01 = snap.find("F/01").unwrap();
        assert_eq!(f01.actual_record_count, 3);
        assert_eq!(f01.days_until_next_fill, Some(5));

        let f02 = snap.find("F/02").unwrap();
        assert!(!f02.files_listed);
        assert_eq!(f02.actual_record_count, 6);

        let f03 = snap.find("F/03").unwrap();
        assert_eq!(f03.actual_record_count, 0);
        assert!(!f03.is_overdue);

        let stats = module_stats(&snap.records);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].forms_count, 2);
        assert_eq!(stats[1].forms_count, 1);
        assert_eq!(audit_summary(&snap.records).compliance_rate, 67);

        assert!(matches!(snap.find("F/99"), Err(QmsError::UnknownRecord(_))));
    }

    #[tokio::test]
    async fn tabular_failure_propagates() {
        let (sheet, docs) = fixture();
        sheet.fail_reads("quota exceeded");
        let err = load_snapshot(&sheet, &docs, now()).await.unwrap_err();
        assert!(matches!(err, QmsError::SourceUnavailable { ref message, .. } if message == "quota exceeded"));
    }

    #[tokio::test]
    async fn committed_cascade_survives_refresh() {
        let (sheet, docs) = fixture();
        let snap = load_snapshot(&sheet, &docs, now()).await.unwrap();
        let plan = apply_file_review(snap.find("F/01").unwrap(), "c", "approved", None, "Mona", now()).unwrap();
        assert!(plan.cascaded);
        let committed = commit(&sheet, plan).await.unwrap();
        assert_eq!(committed.audit_status, RecordStatus::Approved);

        let again = load_snapshot(&sheet, &docs, now()).await.unwrap();
        let f01 = again.find("F/01").unwrap();
        assert_eq!(f01, &committed);
        assert_eq!(f01.audit_status_by.as_deref(), Some("Mona"));
    }

    #[tokio::test]
    async fn failed_commit_leaves_source_untouched() {
        let (sheet, docs) = fixture();
        let snap = load_snapshot(&sheet, &docs, now()).await.unwrap();
        let before = sheet.cell(4, Column::Reviewed);

        sheet.fail_writes("Requested entity was not found.");
        let plan = set_record_reviewed(snap.find("F/03").unwrap(), true, "Omar", now());
        let err = commit(&sheet, plan).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "write to memory-sheet!R4 failed: Requested entity was not found."
        );
        assert_eq!(sheet.cell(4, Column::Reviewed), before);

        sheet.heal();
        let fresh = load_snapshot(&sheet, &docs, now()).await.unwrap();
        assert!(!fresh.find("F/03").unwrap().reviewed);
    }
}
