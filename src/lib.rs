//! # QMS Harness
//!
//! Compliance tracking for a catalog of quality-management forms kept in a
//! spreadsheet, with the filled instances of each form kept in a document
//! folder. The engine in [`qms_harness_core`] reconciles the two; this crate
//! wires it to Google Sheets / Google Drive (or local stand-ins) and exposes
//! it as the `qms` CLI and a JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ Sheet source │   │ Folder store │
//! │ Google / JSON│   │ Drive / FS   │
//! └──────┬───────┘   └──────┬───────┘
//!        └────────┬─────────┘
//!                 ▼
//!        ┌─────────────────┐
//!        │ qms-harness-core│  merge, aggregate, mutate
//!        └────────┬────────┘
//!         ┌───────┴────────┐
//!         ▼                ▼
//!    ┌──────────┐     ┌──────────┐
//!    │   CLI    │     │   HTTP   │
//!    │  (qms)   │     │  (JSON)  │
//!    └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qms sources                   # check configuration and credentials
//! qms modules                   # per-module counts and readiness
//! qms pending                   # overdue and upcoming forms
//! qms review-file QF/01 <file-id> approved --actor "Dana"
//! qms serve                     # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`auth`] | API keys and OAuth refresh-token grant |
//! | [`connector_sheets`] | Google Sheets tabular source |
//! | [`connector_sheet_file`] | Local JSON tabular source |
//! | [`connector_drive`] | Google Drive document store |
//! | [`connector_fs`] | Filesystem document store |
//! | [`backends`] | Source construction from config |
//! | [`sources`] | Source health listing |
//! | [`stats`] | Module and summary overviews |
//! | [`records`] | Record, activity, pending and audit listings |
//! | [`review_cmd`] | Review write-back operations |
//! | [`server`] | JSON HTTP server |

pub mod auth;
pub mod backends;
pub mod config;
pub mod connector_drive;
pub mod connector_fs;
pub mod connector_sheet_file;
pub mod connector_sheets;
pub mod records;
pub mod review_cmd;
pub mod server;
pub mod sources;
pub mod stats;
