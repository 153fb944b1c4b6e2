//! Collaborator construction from config.
//!
//! | `[sheet].backend` | Source |
//! |-------------------|--------|
//! | `google` | [`GoogleSheetsSource`] |
//! | `file` | [`JsonSheetSource`] |
//!
//! | `[drive].backend` | Store |
//! |-------------------|-------|
//! | `google` | [`GoogleDriveStore`] |
//! | `filesystem` | [`FilesystemStore`] |

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;

use qms_harness_core::refresh::{load_snapshot, Snapshot};
use qms_harness_core::store::{DocumentStore, TabularSource};

use crate::auth::{GoogleCredentials, OAuthTokenProvider};
use crate::config::Config;
use crate::connector_drive::GoogleDriveStore;
use crate::connector_fs::FilesystemStore;
use crate::connector_sheet_file::JsonSheetSource;
use crate::connector_sheets::GoogleSheetsSource;

/// The two sources, shared between CLI commands and request handlers.
#[derive(Clone)]
pub struct Backends {
    pub sheet: Arc<dyn TabularSource>,
    pub documents: Arc<dyn DocumentStore>,
}

impl Backends {
    pub fn from_config(config: &Config) -> Result<Self> {
        let needs_google = config.sheet.backend == "google" || config.drive.backend == "google";
        let oauth = if needs_google {
            OAuthTokenProvider::from_env(&config.auth, reqwest::Client::new())?.map(Arc::new)
        } else {
            None
        };

        let sheet: Arc<dyn TabularSource> = match config.sheet.backend.as_str() {
            "google" => {
                let creds = GoogleCredentials::new(config.sheet.api_key_env.as_deref(), oauth.clone());
                if !creds.is_configured() {
                    bail!("Google Sheets backend needs an API key or an OAuth refresh token");
                }
                Arc::new(GoogleSheetsSource::new(&config.sheet, creds)?)
            }
            "file" => {
                let path = config
                    .sheet
                    .path
                    .as_ref()
                    .context("sheet.path required for the file backend")?;
                Arc::new(JsonSheetSource::new(path))
            }
            other => bail!("Unknown sheet backend: {}", other),
        };

        let documents: Arc<dyn DocumentStore> = match config.drive.backend.as_str() {
            "google" => {
                let creds = GoogleCredentials::new(config.drive.api_key_env.as_deref(), oauth);
                if !creds.is_configured() {
                    bail!("Google Drive backend needs an API key or an OAuth refresh token");
                }
                Arc::new(GoogleDriveStore::new(&config.drive, creds)?)
            }
            "filesystem" => Arc::new(FilesystemStore::new(&config.drive)?),
            other => bail!("Unknown drive backend: {}", other),
        };

        Ok(Self { sheet, documents })
    }

    /// Read both sources and reconcile them as of now.
    pub async fn snapshot(&self) -> qms_harness_core::Result<Snapshot> {
        load_snapshot(self.sheet.as_ref(), self.documents.as_ref(), Utc::now()).await
    }
}
