//! JSON HTTP API for the dashboard.
//!
//! Every read endpoint takes a fresh snapshot of both sources, so the
//! numbers always reflect the sheet and folders at request time.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/sources` | Source configuration and health |
//! | `GET`  | `/records` | Merged records (`?module=`, `?overdue=true`, `?code=`) |
//! | `GET`  | `/modules` | Per-module counts and readiness |
//! | `GET`  | `/summary` | Audit, review and monthly headline numbers |
//! | `GET`  | `/activity` | Most recently filled records (`?limit=`) |
//! | `GET`  | `/pending-actions` | Overdue and upcoming forms (`?window=`) |
//! | `GET`  | `/audit` | Per-file audit buckets and compliance rate |
//! | `POST` | `/records/file-review` | Review one file (may cascade) |
//! | `POST` | `/records/status` | Set a record's status |
//! | `POST` | `/records/reviewed` | Tick or clear the reviewed flag |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "invalid_status", "message": "invalid status 'done': ..." } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request`, `invalid_status` | 400 |
//! | `not_found` | 404 |
//! | `source_unavailable`, `write_failure`, `malformed_data` | 502 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser dashboard
//! on another origin can call the API.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use qms_harness_core::aggregate::{activity_feed, audit_buckets, pending_actions, ActivityEntry, AuditBuckets, PendingActions};
use qms_harness_core::taxonomy::module_by_id;
use qms_harness_core::{QmsError, QmsRecord};

use crate::backends::Backends;
use crate::config::Config;
use crate::records::RecordFilter;
use crate::review_cmd::{mark_reviewed, review_file, update_record_status, Outcome};
use crate::sources::{get_sources, SourceStatus};
use crate::stats::{module_overview, summary, ModuleOverview, Summary};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backends: Backends,
}

/// Build the router without binding, so tests can serve it themselves.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sources", get(handle_sources))
        .route("/records", get(handle_records))
        .route("/modules", get(handle_modules))
        .route("/summary", get(handle_summary))
        .route("/activity", get(handle_activity))
        .route("/pending-actions", get(handle_pending))
        .route("/audit", get(handle_audit))
        .route("/records/file-review", post(handle_file_review))
        .route("/records/status", post(handle_record_status))
        .route("/records/reviewed", post(handle_record_reviewed))
        .layer(cors)
        .with_state(state)
}

/// Start the server on `[server].bind`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let backends = Backends::from_config(config)?;
    let state = AppState {
        config: Arc::new(config.clone()),
        backends,
    };

    let bind_addr = config.server.bind.clone();
    let app = router(state);

    info!(bind = %bind_addr, "starting server");
    println!("QMS server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<QmsError> for AppError {
    fn from(err: QmsError) -> Self {
        let status = match &err {
            QmsError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            QmsError::UnknownRecord(_) | QmsError::UnknownFile { .. } => StatusCode::NOT_FOUND,
            QmsError::SourceUnavailable { .. }
            | QmsError::WriteFailure { .. }
            | QmsError::MalformedData { .. } => StatusCode::BAD_GATEWAY,
        };
        if status == StatusCode::BAD_GATEWAY {
            warn!(code = err.code(), "{}", err);
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ GET /health, /sources ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_sources(State(state): State<AppState>) -> Json<Vec<SourceStatus>> {
    Json(get_sources(&state.config))
}

// ============ Read models ============

#[derive(Deserialize)]
struct RecordsQuery {
    module: Option<String>,
    #[serde(default)]
    overdue: bool,
    code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordsResponse {
    records: Vec<QmsRecord>,
    unavailable_folders: Vec<String>,
}

async fn handle_records(
    State(state): State<AppState>,
    Query(q): Query<RecordsQuery>,
) -> ApiResult<RecordsResponse> {
    if let Some(id) = &q.module {
        if module_by_id(id).is_none() {
            return Err(bad_request(format!("unknown module: {}", id)));
        }
    }
    let filter = RecordFilter {
        module: q.module,
        overdue: q.overdue,
    };

    let snapshot = state.backends.snapshot().await?;
    if let Some(code) = &q.code {
        snapshot.find(code)?;
    }
    let records = snapshot
        .records
        .into_iter()
        .filter(|r| filter.matches(r))
        .filter(|r| q.code.as_deref().map_or(true, |c| r.template.code == c))
        .collect();

    Ok(Json(RecordsResponse {
        records,
        unavailable_folders: snapshot.unavailable_folders,
    }))
}

async fn handle_modules(State(state): State<AppState>) -> ApiResult<Vec<ModuleOverview>> {
    let snapshot = state.backends.snapshot().await?;
    Ok(Json(module_overview(&snapshot)))
}

async fn handle_summary(State(state): State<AppState>) -> ApiResult<Summary> {
    let snapshot = state.backends.snapshot().await?;
    Ok(Json(summary(&snapshot)))
}

#[derive(Deserialize)]
struct ActivityQuery {
    limit: Option<usize>,
}

async fn handle_activity(
    State(state): State<AppState>,
    Query(q): Query<ActivityQuery>,
) -> ApiResult<Vec<ActivityEntry>> {
    let limit = q.limit.unwrap_or(state.config.schedule.recent_activity_limit);
    if limit == 0 {
        return Err(bad_request("limit must be >= 1"));
    }
    let snapshot = state.backends.snapshot().await?;
    Ok(Json(activity_feed(&snapshot.records, limit, snapshot.taken_at)))
}

#[derive(Deserialize)]
struct PendingQuery {
    window: Option<i64>,
}

async fn handle_pending(
    State(state): State<AppState>,
    Query(q): Query<PendingQuery>,
) -> ApiResult<PendingActions> {
    let window = q.window.unwrap_or(state.config.schedule.upcoming_window_days);
    if window < 1 {
        return Err(bad_request("window must be >= 1"));
    }
    let snapshot = state.backends.snapshot().await?;
    Ok(Json(pending_actions(&snapshot.records, window)))
}

async fn handle_audit(State(state): State<AppState>) -> ApiResult<AuditBuckets> {
    let snapshot = state.backends.snapshot().await?;
    Ok(Json(audit_buckets(&snapshot.records)))
}

// ============ Mutations ============

fn require_actor(actor: &str) -> Result<(), AppError> {
    if actor.trim().is_empty() {
        return Err(bad_request("actor must not be empty"));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileReviewRequest {
    code: String,
    file_id: String,
    status: String,
    #[serde(default)]
    comment: Option<String>,
    actor: String,
}

async fn handle_file_review(
    State(state): State<AppState>,
    Json(req): Json<FileReviewRequest>,
) -> ApiResult<Outcome> {
    require_actor(&req.actor)?;
    let outcome = review_file(
        &state.backends,
        &req.code,
        &req.file_id,
        &req.status,
        req.comment.as_deref(),
        &req.actor,
    )
    .await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct RecordStatusRequest {
    code: String,
    status: String,
    actor: String,
}

async fn handle_record_status(
    State(state): State<AppState>,
    Json(req): Json<RecordStatusRequest>,
) -> ApiResult<Outcome> {
    require_actor(&req.actor)?;
    let outcome = update_record_status(&state.backends, &req.code, &req.status, &req.actor).await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct ReviewedRequest {
    code: String,
    checked: bool,
    actor: String,
}

async fn handle_record_reviewed(
    State(state): State<AppState>,
    Json(req): Json<ReviewedRequest>,
) -> ApiResult<Outcome> {
    require_actor(&req.actor)?;
    let outcome = mark_reviewed(&state.backends, &req.code, req.checked, &req.actor).await?;
    Ok(Json(outcome))
}
