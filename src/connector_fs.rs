//! Filesystem document store.
//!
//! Each folder link names a directory under `[drive].root`; its regular
//! files (one level deep, filtered by the include/exclude globs) are the
//! filled instances. Hidden files and editor droppings are skipped.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use qms_harness_core::store::DocumentStore;
use qms_harness_core::{FileArtifact, QmsError};

use crate::config::DriveConfig;

/// Listings walk the disk on tokio's blocking pool.
pub struct FilesystemStore {
    scanner: Arc<FolderScanner>,
}

struct FolderScanner {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

impl FilesystemStore {
    pub fn new(config: &DriveConfig) -> Result<Self> {
        let root = config
            .root
            .clone()
            .ok_or_else(|| anyhow::anyhow!("drive.root required for the filesystem backend"))?;
        if !root.is_dir() {
            bail!("Filesystem drive root does not exist: {}", root.display());
        }

        let mut default_excludes = vec![".*".to_string(), "*~".to_string()];
        default_excludes.extend(config.exclude_globs.clone());

        Ok(Self {
            scanner: Arc::new(FolderScanner {
                root,
                include: build_globset(&config.include_globs)?,
                exclude: build_globset(&default_excludes)?,
            }),
        })
    }

    async fn list(&self, folder_link: &str) -> Result<Vec<FileArtifact>> {
        let scanner = Arc::clone(&self.scanner);
        let link = folder_link.to_string();
        tokio::task::spawn_blocking(move || scanner.scan(&link))
            .await
            .context("folder scan task panicked")?
    }
}

impl FolderScanner {
    /// Directory for a folder link. Links are relative paths below the
    /// root; anything that would escape it is refused.
    fn folder_path(&self, link: &str) -> Result<PathBuf> {
        let rel = Path::new(link.trim());
        if rel.as_os_str().is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("folder link '{}' is not a relative path below the root", link);
        }
        Ok(self.root.join(rel))
    }

    fn scan(&self, link: &str) -> Result<Vec<FileArtifact>> {
        let dir = self.folder_path(link)?;
        if !dir.is_dir() {
            bail!("folder does not exist: {}", dir.display());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if self.exclude.is_match(&name) || !self.include.is_match(&name) {
                continue;
            }
            files.push(file_to_artifact(entry.path(), &self.root, name)?);
        }

        files.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(files)
    }
}

fn file_to_artifact(path: &Path, root: &Path, name: String) -> Result<FileArtifact> {
    let metadata = std::fs::metadata(path)?;
    let created = metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let relative = path.strip_prefix(root).unwrap_or(path);

    Ok(FileArtifact {
        id: relative.to_string_lossy().to_string(),
        mime_type: guess_mime(path).to_string(),
        name,
        view_link: format!("file://{}", path.display()),
        created_time: DateTime::<Utc>::from(created),
    })
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[async_trait]
impl DocumentStore for FilesystemStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn list_files(&self, folder_link: &str) -> qms_harness_core::Result<Vec<FileArtifact>> {
        self.list(folder_link)
            .await
            .map_err(|e| QmsError::unavailable(self.name(), format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(root: &Path, exclude: &[&str]) -> DriveConfig {
        DriveConfig {
            backend: "filesystem".into(),
            root: Some(root.to_path_buf()),
            include_globs: vec!["*".into()],
            exclude_globs: exclude.iter().map(|s| s.to_string()).collect(),
            page_size: 100,
            api_key_env: None,
            timeout_secs: 30,
        }
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[tokio::test]
    async fn lists_one_level_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        let ops = tmp.path().join("ops");
        touch(&ops, "b.pdf");
        touch(&ops, "a.docx");
        touch(&ops, ".DS_Store");
        touch(&ops, "draft.tmp");
        touch(&ops.join("nested"), "c.pdf");

        let store = FilesystemStore::new(&config(tmp.path(), &["*.tmp"])).unwrap();
        let files = store.list_files("ops").await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.docx", "b.pdf"]);
        assert_eq!(files[1].id, "ops/b.pdf");
        assert_eq!(files[1].mime_type, "application/pdf");
        assert!(files[1].view_link.starts_with("file://"));
    }

    #[tokio::test]
    async fn empty_folder_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("hr")).unwrap();
        let store = FilesystemStore::new(&config(tmp.path(), &[])).unwrap();
        assert!(store.list_files("hr").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_or_escaping_folders_are_unavailable() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(&config(tmp.path(), &[])).unwrap();
        assert!(matches!(
            store.list_files("missing").await,
            Err(QmsError::SourceUnavailable { .. })
        ));
        assert!(store.list_files("../etc").await.is_err());
        assert!(store.list_files("/etc").await.is_err());
    }

    #[tokio::test]
    async fn concurrent_listings_share_one_scanner() {
        let tmp = TempDir::new().unwrap();
        for i in 0..8 {
            touch(&tmp.path().join(format!("f{}", i)), "a.pdf");
        }
        let store = Arc::new(FilesystemStore::new(&config(tmp.path(), &[])).unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.list_files(&format!("f{}", i)).await.unwrap()
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let files = handle.await.unwrap();
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].id, format!("f{}/a.pdf", i));
        }
    }

    #[test]
    fn missing_root_is_a_config_error() {
        let tmp = TempDir::new().unwrap();
        assert!(FilesystemStore::new(&config(&tmp.path().join("nope"), &[])).is_err());
    }
}
