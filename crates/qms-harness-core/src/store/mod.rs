//! Collaborator traits for the two external sources.
//!
//! The engine never performs I/O itself. A [`TabularSource`] supplies the
//! template rows and accepts single-cell write-back; a [`DocumentStore`]
//! lists the filled instances in a template's folder. Both are async (via
//! `async-trait`) and must be `Send + Sync` so the application can share
//! them across request handlers.
//!
//! | Trait | Read | Write |
//! |-------|------|-------|
//! | [`TabularSource`] | [`read_rows`](TabularSource::read_rows) | [`update_cell`](TabularSource::update_cell) |
//! | [`DocumentStore`] | [`list_files`](DocumentStore::list_files), batch variants | none |

pub mod memory;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::models::FileArtifact;
use crate::sheet::{is_listable_folder, Column};

/// Rows of the form catalog, addressed by 1-based row and column letter.
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Every row including the header. Rows may be ragged.
    ///
    /// Failures are [`QmsError::SourceUnavailable`](crate::QmsError::SourceUnavailable).
    async fn read_rows(&self) -> Result<Vec<Vec<String>>>;

    /// Overwrite exactly one cell.
    ///
    /// Must fail loudly with [`QmsError::WriteFailure`](crate::QmsError::WriteFailure)
    /// carrying the source's own message; a dropped write is a bug.
    async fn update_cell(&self, row: u32, column: Column, value: &str) -> Result<()>;
}

/// Folder listings of filled form instances.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    /// List the files in one folder.
    async fn list_files(&self, folder_link: &str) -> Result<Vec<FileArtifact>>;

    /// List many folders. Links that are empty or carry the "no files yet"
    /// sentinel are skipped without a query; folders that fail to list are
    /// logged and omitted from the result.
    async fn batch_list_files(&self, folder_links: &[String]) -> BTreeMap<String, Vec<FileArtifact>> {
        let unique: BTreeSet<&str> = folder_links
            .iter()
            .map(|l| l.trim())
            .filter(|l| is_listable_folder(l))
            .collect();

        let mut out = BTreeMap::new();
        for link in unique {
            match self.list_files(link).await {
                Ok(files) => {
                    out.insert(link.to_string(), files);
                }
                Err(e) => warn!(store = self.name(), folder = link, "listing failed: {}", e),
            }
        }
        out
    }

    /// Like [`batch_list_files`](Self::batch_list_files) but only counts.
    async fn batch_list_counts(&self, folder_links: &[String]) -> BTreeMap<String, usize> {
        self.batch_list_files(folder_links)
            .await
            .into_iter()
            .map(|(link, files)| (link, files.len()))
            .collect()
    }
}
