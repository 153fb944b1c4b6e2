//! Google Drive document store.
//!
//! Lists the non-trashed children of a folder with `files.list`, following
//! `nextPageToken` until exhausted. Folder cells may hold a full
//! `drive.google.com/drive/folders/<id>` URL, an `open?id=<id>` URL or a
//! bare id.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use qms_harness_core::store::DocumentStore;
use qms_harness_core::{FileArtifact, QmsError};

use crate::auth::{google_error_message, GoogleCredentials};
use crate::config::DriveConfig;

pub const DRIVE_API_FILES: &str = "https://www.googleapis.com/drive/v3/files";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, webViewLink, createdTime, mimeType)";

pub struct GoogleDriveStore {
    client: reqwest::Client,
    files_url: String,
    page_size: u32,
    creds: GoogleCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    web_view_link: String,
    created_time: DateTime<Utc>,
    #[serde(default)]
    mime_type: String,
}

impl From<DriveFile> for FileArtifact {
    fn from(f: DriveFile) -> Self {
        FileArtifact {
            id: f.id,
            name: f.name,
            view_link: f.web_view_link,
            created_time: f.created_time,
            mime_type: f.mime_type,
        }
    }
}

/// Pull the folder id out of a folder link.
pub fn extract_folder_id(link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }

    if let Some(rest) = link.split("/folders/").nth(1) {
        return take_id(rest);
    }
    for marker in ["?id=", "&id="] {
        if let Some(rest) = link.split(marker).nth(1) {
            return take_id(rest);
        }
    }
    if link.contains('/') || link.contains(char::is_whitespace) {
        return None;
    }
    take_id(link)
}

fn take_id(s: &str) -> Option<String> {
    let id: String = s
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!id.is_empty()).then_some(id)
}

impl GoogleDriveStore {
    pub fn new(config: &DriveConfig, creds: GoogleCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            files_url: DRIVE_API_FILES.to_string(),
            page_size: config.page_size,
            creds,
        })
    }

    pub fn with_files_url(mut self, url: impl Into<String>) -> Self {
        self.files_url = url.into();
        self
    }

    async fn list_folder(&self, folder_id: &str) -> Result<Vec<FileArtifact>> {
        let query = format!("'{}' in parents and trashed = false", folder_id);
        let page_size = self.page_size.to_string();
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", page_size.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let req = self.client.get(&self.files_url).query(&params);
            let resp = self
                .creds
                .authorize_read(req)
                .await?
                .send()
                .await
                .context("Failed to reach Google Drive")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                bail!(
                    "HTTP {}: {}",
                    status,
                    google_error_message(&body).unwrap_or_else(|| status.to_string())
                );
            }

            let page: FileList = resp
                .json()
                .await
                .context("Google Drive returned an unexpected body")?;
            files.extend(page.files.into_iter().map(FileArtifact::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl DocumentStore for GoogleDriveStore {
    fn name(&self) -> &str {
        "google-drive"
    }

    async fn list_files(&self, folder_link: &str) -> qms_harness_core::Result<Vec<FileArtifact>> {
        let folder_id = extract_folder_id(folder_link).ok_or_else(|| {
            QmsError::unavailable(self.name(), format!("no folder id in '{}'", folder_link))
        })?;
        let files = self
            .list_folder(&folder_id)
            .await
            .map_err(|e| QmsError::unavailable(self.name(), format!("{:#}", e)))?;
        debug!(folder = %folder_id, files = files.len(), "listed folder");
        Ok(files)
    }
}
