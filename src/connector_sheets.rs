//! Google Sheets tabular source.
//!
//! Reads the whole catalog with one `values.get` on `'<sheet>'!A:R` and
//! writes single cells with `values.update` (`valueInputOption=USER_ENTERED`).
//! Write errors carry Google's own message, e.g.
//! `write to 'Sheet1'!P7 failed: The caller does not have permission`.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use qms_harness_core::sheet::{Column, LAST_COLUMN};
use qms_harness_core::store::TabularSource;
use qms_harness_core::QmsError;

use crate::auth::{google_error_message, GoogleCredentials};
use crate::config::SheetConfig;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub struct GoogleSheetsSource {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    creds: GoogleCredentials,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Stringify a grid of JSON cells. Numbers and booleans keep their JSON
/// text (`true` becomes `TRUE` to match what Sheets displays); nulls
/// become empty strings.
pub fn values_to_rows(values: Vec<Vec<Value>>) -> Vec<Vec<String>> {
    values
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    Value::Bool(true) => "TRUE".to_string(),
                    Value::Bool(false) => "FALSE".to_string(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

impl GoogleSheetsSource {
    pub fn new(config: &SheetConfig, creds: GoogleCredentials) -> Result<Self> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .ok_or_else(|| anyhow!("sheet.spreadsheet_id required"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: SHEETS_API_BASE.to_string(),
            spreadsheet_id,
            sheet_name: config.sheet_name.clone(),
            creds,
        })
    }

    /// Point the source at another API root (used against local mocks).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn quoted_sheet(&self) -> String {
        format!("'{}'", self.sheet_name.replace('\'', "''"))
    }

    /// A1 range for one cell, e.g. `'Sheet1'!P7`.
    pub fn cell_range(&self, row: u32, column: Column) -> String {
        format!("{}!{}{}", self.quoted_sheet(), column.letter(), row)
    }

    fn values_url(&self, range: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Sheets API base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets API base URL cannot carry a path"))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(range);
        Ok(url)
    }

    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>> {
        let range = format!("{}!A:{}", self.quoted_sheet(), LAST_COLUMN.letter());
        let url = self.values_url(&range)?;
        let req = self.creds.authorize_read(self.client.get(url)).await?;
        let resp = req.send().await.context("Failed to reach Google Sheets")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "HTTP {}: {}",
                status,
                google_error_message(&body).unwrap_or_else(|| status.to_string())
            );
        }

        let parsed: ValueRange = resp
            .json()
            .await
            .context("Google Sheets returned an unexpected body")?;
        Ok(values_to_rows(parsed.values))
    }

    async fn put_cell(&self, range: &str, value: &str) -> Result<()> {
        let mut url = self.values_url(range)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        let req = self
            .creds
            .authorize_write(self.client.put(url))
            .await?
            .json(&serde_json::json!({ "values": [[value]] }));
        let resp = req.send().await.context("Failed to reach Google Sheets")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "{}",
                google_error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string())
            );
        }
        Ok(())
    }
}

#[async_trait]
impl TabularSource for GoogleSheetsSource {
    fn name(&self) -> &str {
        "google-sheets"
    }

    async fn read_rows(&self) -> qms_harness_core::Result<Vec<Vec<String>>> {
        let rows = self
            .fetch_rows()
            .await
            .map_err(|e| QmsError::unavailable(self.name(), format!("{:#}", e)))?;
        debug!(rows = rows.len(), sheet = %self.sheet_name, "read sheet");
        Ok(rows)
    }

    async fn update_cell(&self, row: u32, column: Column, value: &str) -> qms_harness_core::Result<()> {
        let range = self.cell_range(row, column);
        self.put_cell(&range, value)
            .await
            .map_err(|e| QmsError::write_failure(&range, format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::OAuthTokenProvider;
    use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Writes = Arc<Mutex<Vec<(String, String, Value)>>>;

    fn config() -> SheetConfig {
        SheetConfig {
            backend: "google".into(),
            spreadsheet_id: Some("sheet-123".into()),
            sheet_name: "QMS Forms".into(),
            api_key_env: None,
            path: None,
            timeout_secs: 5,
        }
    }

    async fn read_values(Path((_id, range)): Path<(String, String)>) -> Json<Value> {
        assert_eq!(range, "'QMS Forms'!A:R");
        Json(serde_json::json!({
            "range": range,
            "values": [["Category", "Code"], ["01-Document Control", "QF/01", 3, true]]
        }))
    }

    async fn write_value(
        State(writes): State<Writes>,
        Path((_id, range)): Path<(String, String)>,
        Query(q): Query<HashMap<String, String>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        if range.ends_with("R9") {
            return (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": { "code": 403, "message": "The caller does not have permission" } })),
            );
        }
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert_eq!(q.get("valueInputOption").map(String::as_str), Some("USER_ENTERED"));
        writes.lock().unwrap().push((range, auth, body));
        (StatusCode::OK, Json(serde_json::json!({ "updatedCells": 1 })))
    }

    async fn mock() -> (String, Writes) {
        let writes: Writes = Arc::default();
        let app = Router::new()
            .route(
                "/v4/spreadsheets/{id}/values/{range}",
                get(read_values).put(write_value),
            )
            .route(
                "/token",
                post(|| async { Json(serde_json::json!({ "access_token": "tok", "expires_in": 3600 })) }),
            )
            .with_state(writes.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.ok() });
        (format!("http://{}", addr), writes)
    }

    fn source(base: &str, oauth: bool) -> GoogleSheetsSource {
        let provider = oauth.then(|| {
            Arc::new(OAuthTokenProvider::new(
                reqwest::Client::new(),
                format!("{}/token", base),
                "id",
                "secret",
                "refresh",
            ))
        });
        let creds = GoogleCredentials {
            api_key: Some("key".into()),
            oauth: provider,
        };
        GoogleSheetsSource::new(&config(), creds)
            .unwrap()
            .with_base_url(format!("{}/v4/spreadsheets", base))
    }

    #[test]
    fn cell_values_are_stringified() {
        let rows = values_to_rows(vec![vec![
            Value::from("x"),
            Value::from(3),
            Value::Null,
            Value::from(false),
        ]]);
        assert_eq!(rows, vec![vec!["x", "3", "", "FALSE"]]);
    }

    #[test]
    fn quotes_in_sheet_names_are_doubled() {
        let mut cfg = config();
        cfg.sheet_name = "Bob's".into();
        let src = GoogleSheetsSource::new(&cfg, GoogleCredentials::default()).unwrap();
        assert_eq!(src.cell_range(7, Column::ReviewLedger), "'Bob''s'!P7");
    }

    #[tokio::test]
    async fn reads_range_with_api_key() {
        let (base, _) = mock().await;
        let rows = source(&base, false).read_rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["01-Document Control", "QF/01", "3", "TRUE"]);
    }

    #[tokio::test]
    async fn writes_single_cell_with_bearer() {
        let (base, writes) = mock().await;
        source(&base, true)
            .update_cell(7, Column::ReviewLedger, "{\"a\":1}")
            .await
            .unwrap();
        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "'QMS Forms'!P7");
        assert_eq!(writes[0].1, "Bearer tok");
        assert_eq!(writes[0].2, serde_json::json!({ "values": [["{\"a\":1}"]] }));
    }

    #[tokio::test]
    async fn rejected_write_keeps_google_message() {
        let (base, _) = mock().await;
        let err = source(&base, true)
            .update_cell(9, Column::Reviewed, "TRUE")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "write to 'QMS Forms'!R9 failed: The caller does not have permission"
        );
    }

    #[tokio::test]
    async fn write_without_oauth_fails_loudly() {
        let (base, writes) = mock().await;
        let err = source(&base, false)
            .update_cell(7, Column::Reviewed, "TRUE")
            .await
            .unwrap_err();
        assert!(matches!(err, QmsError::WriteFailure { .. }));
        assert!(writes.lock().unwrap().is_empty());
    }
}
