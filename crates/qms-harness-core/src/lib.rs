//! # QMS Harness Core
//!
//! The reconciliation and scheduling engine behind QMS Harness: data
//! models, the review workflow, due-date projection, record merging,
//! compliance aggregation, and the collaborator traits that feed it.
//!
//! This crate contains no tokio, reqwest, filesystem I/O, or other
//! native-only dependencies. Every function that depends on the current
//! time takes an explicit `now`, so results are a deterministic function
//! of the supplied snapshot.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ TabularSource│   │ DocumentStore│
//! │  (rows)      │   │ (file lists) │
//! └──────┬───────┘   └──────┬───────┘
//!        ▼                  ▼
//!   sheet::decode_rows   batch_list_files
//!        └───────┬──────────┘
//!                ▼
//!          merge::merge  ──▶  Vec<QmsRecord>
//!                                 │
//!                 ┌───────────────┼───────────────┐
//!                 ▼                               ▼
//!         aggregate::* (read models)      mutate::* (write plans)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Form templates, file artifacts, merged records |
//! | [`review`] | Per-file review state, record status, review ledger codec |
//! | [`schedule`] | Frequency label interpretation and due-date projection |
//! | [`timestamp`] | Lenient timestamp parsing and relative formatting |
//! | [`taxonomy`] | Category to module mapping and audit label normalization |
//! | [`sheet`] | Fixed column layout of the tabular source |
//! | [`merge`] | Template row + folder listing → [`models::QmsRecord`] |
//! | [`aggregate`] | Module, audit, review, monthly and activity summaries |
//! | [`mutate`] | File/record status changes, cascade, write-back plans |
//! | [`store`] | Collaborator traits and in-memory implementations |
//! | [`refresh`] | Snapshot loading and write-plan commit |

pub mod aggregate;
pub mod error;
pub mod merge;
pub mod models;
pub mod mutate;
pub mod refresh;
pub mod review;
pub mod schedule;
pub mod sheet;
pub mod store;
pub mod taxonomy;
pub mod timestamp;

pub use error::{QmsError, Result};
pub use models::{FileArtifact, FormTemplate, QmsRecord};
pub use review::{RecordStatus, ReviewLedger, ReviewState, ReviewStatus};
