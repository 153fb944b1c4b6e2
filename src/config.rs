//! TOML configuration.
//!
//! ```toml
//! [sheet]
//! backend = "google"            # or "file"
//! spreadsheet_id = "1AbC..."
//! sheet_name = "Sheet1"
//! api_key_env = "GOOGLE_API_KEY"
//!
//! [drive]
//! backend = "google"            # or "filesystem"
//! page_size = 100
//!
//! [auth]
//! token_url = "https://oauth2.googleapis.com/token"
//!
//! [schedule]
//! upcoming_window_days = 5
//! recent_activity_limit = 5
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! Secrets are never stored in the file; the `*_env` keys name the
//! environment variables they are read from.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sheet: SheetConfig,
    pub drive: DriveConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetConfig {
    pub backend: String,
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    /// Env var holding an API key for read-only access without OAuth.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Path of the JSON sheet file for the `file` backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_sheet_name() -> String {
    "Sheet1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    pub backend: String,
    /// Directory holding one sub-directory per folder link (`filesystem`).
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_include_globs() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_page_size() -> u32 {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_client_id_env")]
    pub client_id_env: String,
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,
    #[serde(default = "default_refresh_token_env")]
    pub refresh_token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            client_id_env: default_client_id_env(),
            client_secret_env: default_client_secret_env(),
            refresh_token_env: default_refresh_token_env(),
        }
    }
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}
fn default_client_id_env() -> String {
    "GOOGLE_CLIENT_ID".to_string()
}
fn default_client_secret_env() -> String {
    "GOOGLE_CLIENT_SECRET".to_string()
}
fn default_refresh_token_env() -> String {
    "GOOGLE_REFRESH_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_upcoming_window")]
    pub upcoming_window_days: i64,
    #[serde(default = "default_recent_limit")]
    pub recent_activity_limit: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            upcoming_window_days: default_upcoming_window(),
            recent_activity_limit: default_recent_limit(),
        }
    }
}

fn default_upcoming_window() -> i64 {
    qms_harness_core::aggregate::DEFAULT_UPCOMING_WINDOW
}
fn default_recent_limit() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    match config.sheet.backend.as_str() {
        "google" => {
            if config
                .sheet
                .spreadsheet_id
                .as_deref()
                .map_or(true, |id| id.trim().is_empty())
            {
                anyhow::bail!("sheet.spreadsheet_id must be set when backend is 'google'");
            }
        }
        "file" => {
            if config.sheet.path.is_none() {
                anyhow::bail!("sheet.path must be set when backend is 'file'");
            }
        }
        other => anyhow::bail!(
            "Unknown sheet backend: '{}'. Must be google or file.",
            other
        ),
    }

    match config.drive.backend.as_str() {
        "google" => {
            if !(1..=1000).contains(&config.drive.page_size) {
                anyhow::bail!("drive.page_size must be in [1, 1000]");
            }
        }
        "filesystem" => {
            if config.drive.root.is_none() {
                anyhow::bail!("drive.root must be set when backend is 'filesystem'");
            }
        }
        other => anyhow::bail!(
            "Unknown drive backend: '{}'. Must be google or filesystem.",
            other
        ),
    }

    if config.schedule.upcoming_window_days < 1 {
        anyhow::bail!("schedule.upcoming_window_days must be >= 1");
    }
    if config.schedule.recent_activity_limit < 1 {
        anyhow::bail!("schedule.recent_activity_limit must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const LOCAL: &str = r#"
[sheet]
backend = "file"
path = "/tmp/sheet.json"

[drive]
backend = "filesystem"
root = "/tmp/folders"

[server]
bind = "127.0.0.1:7341"
"#;

    #[test]
    fn local_backends_with_defaults() {
        let file = write_config(LOCAL);
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.sheet.sheet_name, "Sheet1");
        assert_eq!(cfg.drive.include_globs, vec!["*".to_string()]);
        assert_eq!(cfg.schedule.upcoming_window_days, 5);
        assert_eq!(cfg.auth.refresh_token_env, "GOOGLE_REFRESH_TOKEN");
    }

    #[test]
    fn google_sheet_needs_spreadsheet_id() {
        let file = write_config(&LOCAL.replace("backend = \"file\"", "backend = \"google\""));
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("spreadsheet_id"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let file = write_config(&LOCAL.replace("\"filesystem\"", "\"dropbox\""));
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown drive backend"));
    }

    #[test]
    fn zero_window_is_rejected() {
        let content = format!("{}\n[schedule]\nupcoming_window_days = 0\n", LOCAL);
        let file = write_config(&content);
        assert!(load_config(file.path()).is_err());
    }
}
