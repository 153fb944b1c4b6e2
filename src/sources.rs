//! Source configuration and health listing.
//!
//! Used by `qms sources` and `GET /sources`. Checks are local only: no
//! request is sent to Google, so a "healthy" Google source means its
//! credentials are present, not that they are accepted.
//!
//! | Source | Healthy When |
//! |--------|-------------|
//! | `sheet:google` | spreadsheet id set and an API key or refresh token present |
//! | `sheet:file` | JSON file exists |
//! | `drive:google` | an API key or refresh token present |
//! | `drive:filesystem` | root directory exists |
//! | `oauth` | refresh token, client id and client secret all present |

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;

/// Health and configuration status of a single source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub configured: bool,
    pub healthy: bool,
    pub notes: Option<String>,
}

fn env_present(name: Option<&str>) -> bool {
    name.and_then(|n| std::env::var(n).ok())
        .is_some_and(|v| !v.trim().is_empty())
}

pub fn get_sources(config: &Config) -> Vec<SourceStatus> {
    let auth = &config.auth;
    let refresh = env_present(Some(auth.refresh_token_env.as_str()));
    let oauth_complete = refresh
        && env_present(Some(auth.client_id_env.as_str()))
        && env_present(Some(auth.client_secret_env.as_str()));

    let mut sources = Vec::new();

    match config.sheet.backend.as_str() {
        "google" => {
            let key = env_present(config.sheet.api_key_env.as_deref());
            sources.push(SourceStatus {
                name: "sheet:google".to_string(),
                configured: true,
                healthy: key || oauth_complete,
                notes: Some(match (key, oauth_complete) {
                    (_, true) => format!("sheet '{}', read/write", config.sheet.sheet_name),
                    (true, false) => format!("sheet '{}', read-only (API key)", config.sheet.sheet_name),
                    (false, false) => "no API key or OAuth credentials".to_string(),
                }),
            });
        }
        other => {
            let path = config.sheet.path.as_deref();
            let exists = path.is_some_and(|p| p.exists());
            sources.push(SourceStatus {
                name: format!("sheet:{}", other),
                configured: true,
                healthy: exists,
                notes: path.map(|p| {
                    if exists {
                        format!("path: {}", p.display())
                    } else {
                        format!("file not found: {}", p.display())
                    }
                }),
            });
        }
    }

    match config.drive.backend.as_str() {
        "google" => {
            let key = env_present(config.drive.api_key_env.as_deref());
            sources.push(SourceStatus {
                name: "drive:google".to_string(),
                configured: true,
                healthy: key || oauth_complete,
                notes: Some(format!("page size {}", config.drive.page_size)),
            });
        }
        other => {
            let root = config.drive.root.as_deref();
            let exists = root.is_some_and(|r| r.is_dir());
            sources.push(SourceStatus {
                name: format!("drive:{}", other),
                configured: true,
                healthy: exists,
                notes: root.map(|r| {
                    if exists {
                        format!("root: {}", r.display())
                    } else {
                        "root directory does not exist".to_string()
                    }
                }),
            });
        }
    }

    sources.push(SourceStatus {
        name: "oauth".to_string(),
        configured: refresh,
        healthy: oauth_complete,
        notes: if refresh && !oauth_complete {
            Some(format!(
                "{} or {} not set",
                auth.client_id_env, auth.client_secret_env
            ))
        } else {
            None
        },
    });

    sources
}

/// CLI entry point for `qms sources`.
pub fn list_sources(config: &Config) -> Result<()> {
    let sources = get_sources(config);

    println!("{:<20} {:<16} {:<8} NOTES", "SOURCE", "STATUS", "HEALTHY");
    for s in &sources {
        let status_str = if s.configured { "OK" } else { "NOT CONFIGURED" };
        println!(
            "{:<20} {:<16} {:<8} {}",
            s.name,
            status_str,
            s.healthy,
            s.notes.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
