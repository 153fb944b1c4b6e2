//! # QMS Harness CLI (`qms`)
//!
//! The `qms` binary reads the form catalog and its folders, prints
//! compliance views, writes reviews back to the sheet, and serves the
//! JSON API.
//!
//! ## Usage
//!
//! ```bash
//! qms --config ./config/qms.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qms sources` | List sources and their health |
//! | `qms records` | List merged records |
//! | `qms show <code>` | Show one record with its files |
//! | `qms modules` | Per-module counts and readiness |
//! | `qms summary` | Dashboard headline numbers |
//! | `qms activity` | Most recently filled records |
//! | `qms pending` | Overdue and upcoming forms |
//! | `qms audit` | Per-file audit buckets |
//! | `qms review-file` | Approve, reject or reset one file |
//! | `qms set-status` | Set a record's status |
//! | `qms mark-reviewed` | Tick or clear a record's reviewed flag |
//! | `qms serve` | Start the HTTP server |
//!
//! Logs go to stderr and are controlled by `RUST_LOG`
//! (default `qms=info,qms_harness=info,qms_harness_core=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qms_harness::backends::Backends;
use qms_harness::records::{AuditBucketArg, RecordFilter};
use qms_harness::{config, records, review_cmd, server, sources, stats};

/// QMS Harness CLI: compliance tracking for form catalogs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/qms.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "qms",
    about = "QMS Harness: compliance tracking for a form catalog and its filled records",
    version,
    long_about = "QMS Harness reconciles a spreadsheet catalog of quality-management forms \
    with the folders holding their filled instances, projects when each form is next due, \
    tracks per-file reviews, and exposes the results via a CLI and a JSON HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/qms.toml`.
    #[arg(long, global = true, default_value = "./config/qms.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured sources and their status.
    ///
    /// Checks configuration and credentials locally; nothing is fetched.
    Sources,

    /// List merged records.
    Records {
        /// Only records in this module (`sales`, `operations`, `quality`,
        /// `procurement`, `hr`, `rnd`, `management`).
        #[arg(long)]
        module: Option<String>,

        /// Only overdue records.
        #[arg(long)]
        overdue: bool,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show one record with its files and reviews.
    Show {
        /// Form code, e.g. `QF/01`.
        code: String,

        #[arg(long)]
        json: bool,
    },

    /// Per-module form, record, pending and issue counts with readiness.
    Modules {
        #[arg(long)]
        json: bool,
    },

    /// Audit, review and 30-day headline numbers.
    Summary {
        #[arg(long)]
        json: bool,
    },

    /// Most recently filled records.
    Activity {
        /// Number of entries (defaults to `[schedule].recent_activity_limit`).
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Overdue forms and forms due soon.
    Pending {
        /// Upcoming window in days (defaults to `[schedule].upcoming_window_days`).
        #[arg(long)]
        window: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Per-file audit items grouped into pending, compliant and issues.
    Audit {
        #[arg(long, value_enum, default_value = "all")]
        bucket: AuditBucketArg,

        #[arg(long)]
        json: bool,
    },

    /// Set one file's review status.
    ///
    /// When every listed file of the record ends up approved, the record
    /// itself is promoted to Approved in the same write.
    ReviewFile {
        /// Form code, e.g. `QF/01`.
        code: String,

        /// File id as listed by `qms show`.
        file_id: String,

        /// `approved`, `rejected` or `pending_review`.
        status: String,

        #[arg(long)]
        comment: Option<String>,

        /// Name recorded as the reviewer.
        #[arg(long)]
        actor: String,

        #[arg(long)]
        json: bool,
    },

    /// Set a record's status directly.
    SetStatus {
        code: String,

        /// `approved`, `rejected` or `pending`.
        status: String,

        #[arg(long)]
        actor: String,

        #[arg(long)]
        json: bool,
    },

    /// Tick a record's "reviewed" flag, or clear it with `--clear`.
    MarkReviewed {
        code: String,

        #[arg(long)]
        clear: bool,

        #[arg(long)]
        actor: String,

        #[arg(long)]
        json: bool,
    },

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("qms=info,qms_harness=info,qms_harness_core=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        command => {
            let backends = Backends::from_config(&cfg)?;
            match command {
                Commands::Records {
                    module,
                    overdue,
                    json,
                } => {
                    let filter = RecordFilter { module, overdue };
                    records::run_records(&backends, &filter, json).await?;
                }
                Commands::Show { code, json } => {
                    records::run_show(&backends, &code, json).await?;
                }
                Commands::Modules { json } => {
                    stats::run_modules(&backends, json).await?;
                }
                Commands::Summary { json } => {
                    stats::run_summary(&backends, json).await?;
                }
                Commands::Activity { limit, json } => {
                    let limit = limit.unwrap_or(cfg.schedule.recent_activity_limit);
                    records::run_activity(&backends, limit, json).await?;
                }
                Commands::Pending { window, json } => {
                    let window = window.unwrap_or(cfg.schedule.upcoming_window_days);
                    records::run_pending(&backends, window, json).await?;
                }
                Commands::Audit { bucket, json } => {
                    records::run_audit(&backends, bucket, json).await?;
                }
                Commands::ReviewFile {
                    code,
                    file_id,
                    status,
                    comment,
                    actor,
                    json,
                } => {
                    review_cmd::run_review_file(
                        &backends,
                        &code,
                        &file_id,
                        &status,
                        comment.as_deref(),
                        &actor,
                        json,
                    )
                    .await?;
                }
                Commands::SetStatus {
                    code,
                    status,
                    actor,
                    json,
                } => {
                    review_cmd::run_set_status(&backends, &code, &status, &actor, json).await?;
                }
                Commands::MarkReviewed {
                    code,
                    clear,
                    actor,
                    json,
                } => {
                    review_cmd::run_mark_reviewed(&backends, &code, clear, &actor, json).await?;
                }
                Commands::Sources | Commands::Serve => unreachable!(),
            }
        }
    }

    Ok(())
}
