//! Review write-back.
//!
//! Each operation reads a fresh snapshot, plans the change against the
//! current record, and commits the planned cell writes to the sheet. Two
//! reviewers racing on the same record both succeed and the last write
//! wins; nothing is locked.
//!
//! The same three operations back `POST /records/*` in the server.

use anyhow::{bail, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use qms_harness_core::mutate::{apply_file_review, set_record_reviewed, set_record_status, MutationPlan};
use qms_harness_core::refresh::commit;
use qms_harness_core::QmsRecord;

use crate::backends::Backends;

/// Result of a committed mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub record: QmsRecord,
    /// True when the change promoted the record to approved.
    pub cascaded: bool,
    /// Cells written, e.g. `P7`.
    pub cells: Vec<String>,
}

async fn commit_plan(backends: &Backends, plan: MutationPlan) -> qms_harness_core::Result<Outcome> {
    let cascaded = plan.cascaded;
    let cells = plan.writes.iter().map(|w| w.address()).collect();
    let record = commit(backends.sheet.as_ref(), plan).await?;
    Ok(Outcome {
        record,
        cascaded,
        cells,
    })
}

pub async fn review_file(
    backends: &Backends,
    code: &str,
    file_id: &str,
    status: &str,
    comment: Option<&str>,
    actor: &str,
) -> qms_harness_core::Result<Outcome> {
    let snapshot = backends.snapshot().await?;
    let record = snapshot.find(code)?;
    let plan = apply_file_review(record, file_id, status, comment, actor, Utc::now())?;
    commit_plan(backends, plan).await
}

pub async fn update_record_status(
    backends: &Backends,
    code: &str,
    status: &str,
    actor: &str,
) -> qms_harness_core::Result<Outcome> {
    let snapshot = backends.snapshot().await?;
    let plan = set_record_status(snapshot.find(code)?, status, actor, Utc::now())?;
    commit_plan(backends, plan).await
}

pub async fn mark_reviewed(
    backends: &Backends,
    code: &str,
    checked: bool,
    actor: &str,
) -> qms_harness_core::Result<Outcome> {
    let snapshot = backends.snapshot().await?;
    let plan = set_record_reviewed(snapshot.find(code)?, checked, actor, Utc::now());
    commit_plan(backends, plan).await
}

fn require_actor(actor: &str) -> Result<()> {
    if actor.trim().is_empty() {
        bail!("--actor must not be empty");
    }
    Ok(())
}

fn print_outcome(outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    let r = &outcome.record;
    println!(
        "{}: status {}, reviewed {} (wrote {})",
        r.template.code,
        r.audit_status.label(),
        r.reviewed,
        outcome.cells.join(", ")
    );
    if outcome.cascaded {
        println!("All files approved; record promoted to Approved.");
    }
    Ok(())
}

pub async fn run_review_file(
    backends: &Backends,
    code: &str,
    file_id: &str,
    status: &str,
    comment: Option<&str>,
    actor: &str,
    json: bool,
) -> Result<()> {
    require_actor(actor)?;
    let outcome = review_file(backends, code, file_id, status, comment, actor).await?;
    info!(code, file_id, status, actor, "file reviewed");
    print_outcome(&outcome, json)
}

pub async fn run_set_status(
    backends: &Backends,
    code: &str,
    status: &str,
    actor: &str,
    json: bool,
) -> Result<()> {
    require_actor(actor)?;
    let outcome = update_record_status(backends, code, status, actor).await?;
    info!(code, status, actor, "record status set");
    print_outcome(&outcome, json)
}

pub async fn run_mark_reviewed(
    backends: &Backends,
    code: &str,
    clear: bool,
    actor: &str,
    json: bool,
) -> Result<()> {
    require_actor(actor)?;
    let outcome = mark_reviewed(backends, code, !clear, actor).await?;
    info!(code, reviewed = !clear, actor, "reviewed flag set");
    print_outcome(&outcome, json)
}
