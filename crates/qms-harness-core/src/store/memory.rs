//! In-memory collaborators for tests and embedding.
//!
//! Both types sit behind `std::sync::RwLock` and can be told to fail, so
//! the degraded paths (unlistable folder, rejected write) are testable
//! without a network.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{QmsError, Result};
use crate::models::FileArtifact;
use crate::sheet::Column;

use super::{DocumentStore, TabularSource};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// A sheet held as a grid of strings.
pub struct InMemorySheet {
    name: String,
    rows: RwLock<Vec<Vec<String>>>,
    read_error: RwLock<Option<String>>,
    write_error: RwLock<Option<String>>,
}

impl InMemorySheet {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            name: "memory-sheet".to_string(),
            rows: RwLock::new(rows),
            read_error: RwLock::new(None),
            write_error: RwLock::new(None),
        }
    }

    /// Make every subsequent read fail with `message`.
    pub fn fail_reads(&self, message: impl Into<String>) {
        *write(&self.read_error) = Some(message.into());
    }

    /// Make every subsequent cell update fail with `message`.
    pub fn fail_writes(&self, message: impl Into<String>) {
        *write(&self.write_error) = Some(message.into());
    }

    pub fn heal(&self) {
        *write(&self.read_error) = None;
        *write(&self.write_error) = None;
    }

    /// Current value of one cell, empty when out of range.
    pub fn cell(&self, row: u32, column: Column) -> String {
        let rows = read(&self.rows);
        (row as usize)
            .checked_sub(1)
            .and_then(|r| rows.get(r))
            .and_then(|r| r.get(column.index()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TabularSource for InMemorySheet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        if let Some(message) = read(&self.read_error).clone() {
            return Err(QmsError::unavailable(&self.name, message));
        }
        Ok(read(&self.rows).clone())
    }

    async fn update_cell(&self, row: u32, column: Column, value: &str) -> Result<()> {
        let target = format!("{}!{}{}", self.name, column.letter(), row);
        if let Some(message) = read(&self.write_error).clone() {
            return Err(QmsError::write_failure(target, message));
        }
        let Some(idx) = (row as usize).checked_sub(1) else {
            return Err(QmsError::write_failure(target, "rows are 1-based"));
        };

        let mut rows = write(&self.rows);
        if rows.len() <= idx {
            rows.resize(idx + 1, Vec::new());
        }
        let cells = &mut rows[idx];
        if cells.len() <= column.index() {
            cells.resize(column.index() + 1, String::new());
        }
        cells[column.index()] = value.to_string();
        Ok(())
    }
}

/// Folder listings keyed by folder link.
#[derive(Default)]
pub struct InMemoryDocuments {
    folders: RwLock<HashMap<String, Vec<FileArtifact>>>,
    unavailable: RwLock<HashSet<String>>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_folder(&self, link: impl Into<String>, files: Vec<FileArtifact>) {
        write(&self.folders).insert(link.into(), files);
    }

    /// Make listing `link` fail.
    pub fn mark_unavailable(&self, link: impl Into<String>) {
        write(&self.unavailable).insert(link.into());
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocuments {
    fn name(&self) -> &str {
        "memory-documents"
    }

    async fn list_files(&self, folder_link: &str) -> Result<Vec<FileArtifact>> {
        if read(&self.unavailable).contains(folder_link) {
            return Err(QmsError::unavailable(
                self.name(),
                format!("folder {} cannot be listed", folder_link),
            ));
        }
        Ok(read(&self.folders)
            .get(folder_link)
            .cloned()
            .unwrap_or_default())
    }
}
