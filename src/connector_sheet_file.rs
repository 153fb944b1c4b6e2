//! Local JSON sheet.
//!
//! Holds the same shape the Sheets API returns for a range read, so an
//! exported sheet can be used as-is:
//!
//! ```json
//! { "values": [["Category", "Code", "Name"], ["01-Document Control", "QF/01", "Change request"]] }
//! ```
//!
//! Cell updates rewrite the whole file through a temp file and rename.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use qms_harness_core::sheet::Column;
use qms_harness_core::store::TabularSource;
use qms_harness_core::QmsError;

use crate::connector_sheets::values_to_rows;

#[derive(Deserialize)]
struct SheetFile {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Serialize)]
struct SheetFileOut<'a> {
    values: &'a [Vec<String>],
}

pub struct JsonSheetSource {
    path: PathBuf,
    name: String,
    lock: Mutex<()>,
}

impl JsonSheetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("sheet-file:{}", path.display());
        Self {
            path,
            name,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Vec<String>>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let parsed: SheetFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(values_to_rows(parsed.values))
    }

    async fn store(&self, rows: &[Vec<String>]) -> Result<()> {
        let body = serde_json::to_string_pretty(&SheetFileOut { values: rows })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    async fn write_cell(&self, row: u32, column: Column, value: &str) -> Result<()> {
        let idx = (row as usize)
            .checked_sub(1)
            .context("rows are 1-based")?;

        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        if rows.len() <= idx {
            rows.resize(idx + 1, Vec::new());
        }
        let cells = &mut rows[idx];
        if cells.len() <= column.index() {
            cells.resize(column.index() + 1, String::new());
        }
        cells[column.index()] = value.to_string();
        self.store(&rows).await
    }
}

#[async_trait]
impl TabularSource for JsonSheetSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_rows(&self) -> qms_harness_core::Result<Vec<Vec<String>>> {
        let _guard = self.lock.lock().await;
        self.load()
            .await
            .map_err(|e| QmsError::unavailable(&self.name, format!("{:#}", e)))
    }

    async fn update_cell(&self, row: u32, column: Column, value: &str) -> qms_harness_core::Result<()> {
        self.write_cell(row, column, value).await.map_err(|e| {
            QmsError::write_failure(
                format!("{}!{}{}", self.path.display(), column.letter(), row),
                format!("{:#}", e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("sheet.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn reads_mixed_cells() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"{"values":[["Category","Code"],["01-Doc","QF/01",4,null]]}"#);
        let rows = JsonSheetSource::new(path).read_rows().await.unwrap();
        assert_eq!(rows[1], vec!["01-Doc", "QF/01", "4", ""]);
    }

    #[tokio::test]
    async fn update_persists_and_pads() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"{"values":[["Category","Code"],["01-Doc","QF/01"]]}"#);
        let source = JsonSheetSource::new(&path);
        source.update_cell(2, Column::Reviewed, "TRUE").await.unwrap();

        let rows = JsonSheetSource::new(&path).read_rows().await.unwrap();
        assert_eq!(rows[1].len(), 18);
        assert_eq!(rows[1][Column::Reviewed.index()], "TRUE");
        assert_eq!(rows[1][1], "QF/01");
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let source = JsonSheetSource::new(dir.path().join("nope.json"));
        let err = source.read_rows().await.unwrap_err();
        assert!(matches!(err, QmsError::SourceUnavailable { .. }));
        let err = source.update_cell(2, Column::Reviewed, "TRUE").await.unwrap_err();
        assert!(matches!(err, QmsError::WriteFailure { .. }));
    }
}
