//! HTTP API tests against a server running in-process on local backends.

use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

use qms_harness::config::load_config;
use qms_harness::server::run_server;

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Write a sheet, folders and config under `tmp`, start the server, and
/// return its base URL.
async fn start_server(tmp: &TempDir) -> String {
    let root = tmp.path();
    let folders = root.join("folders");
    fs::create_dir_all(folders.join("ops-batch")).unwrap();
    fs::create_dir_all(folders.join("qa-nc")).unwrap();
    fs::write(folders.join("ops-batch").join("B-001.pdf"), b"x").unwrap();
    fs::write(folders.join("ops-batch").join("B-002.pdf"), b"x").unwrap();
    fs::write(folders.join("qa-nc").join("NC-001.pdf"), b"x").unwrap();

    let sheet = json!({
        "values": [
            ["Category", "Code", "Name"],
            ["02-Operations", "OP/01", "Batch record", "", "Weekly", "", "ops-batch"],
            ["03-Quality", "QA/05", "Nonconformity report", "", "As needed", "", "qa-nc",
             "", "", "", "", "", "", "", "",
             "{\"recordStatus\":\"rejected\",\"qa-nc/NC-001.pdf\":{\"status\":\"rejected\",\"comment\":\"unsigned\"}}"],
            ["07-Management", "MG/01", "Management review", "", "Yearly", "", "missing-folder", "MG-01-003", "", "", "", "Pending (3 files)"]
        ]
    });
    fs::write(root.join("sheet.json"), serde_json::to_string(&sheet).unwrap()).unwrap();

    let port = find_free_port();
    let config_path = root.join("qms.toml");
    fs::write(
        &config_path,
        format!(
            r#"[sheet]
backend = "file"
path = "{root}/sheet.json"

[drive]
backend = "filesystem"
root = "{root}/folders"

[schedule]
upcoming_window_days = 7
recent_activity_limit = 2

[server]
bind = "127.0.0.1:{port}"
"#,
            root = root.display(),
            port = port
        ),
    )
    .unwrap();

    let cfg = load_config(&config_path).unwrap();
    tokio::spawn(async move {
        run_server(&cfg).await.ok();
    });
    wait_for_server(port).await;
    format!("http://127.0.0.1:{}", port)
}

async fn get_json(base: &str, path: &str) -> Value {
    let resp = reqwest::get(format!("{}{}", base, path)).await.unwrap();
    assert_eq!(resp.status(), 200, "GET {}", path);
    resp.json().await.unwrap()
}

async fn post_json(base: &str, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}{}", base, path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let body = get_json(&base, "/health").await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_read_models() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let records = get_json(&base, "/records").await;
    assert_eq!(records["records"].as_array().unwrap().len(), 3);
    assert_eq!(
        records["unavailableFolders"],
        json!(["missing-folder"]),
        "a folder that cannot be listed is reported, not fatal"
    );
    let mg = get_json(&base, "/records?code=MG/01").await;
    assert_eq!(mg["records"][0]["actualRecordCount"], 3);
    assert_eq!(mg["records"][0]["filesListed"], false);

    let modules = get_json(&base, "/modules").await;
    let ids: Vec<&str> = modules
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["operations", "quality", "management"]);
    assert_eq!(modules[1]["readiness"]["status"], "attention");

    let summary = get_json(&base, "/summary").await;
    assert_eq!(summary["audit"]["issues"], 1);
    assert_eq!(summary["complete"], false);

    let activity = get_json(&base, "/activity").await;
    assert_eq!(activity.as_array().unwrap().len(), 2);

    let audit = get_json(&base, "/audit").await;
    assert_eq!(audit["issues"][0]["comment"], "unsigned");
    assert_eq!(audit["pending"].as_array().unwrap().len(), 2);

    let pending = get_json(&base, "/pending-actions").await;
    assert!(pending["overdue"].as_array().unwrap().is_empty());
    let upcoming: Vec<&str> = pending["upcoming"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["code"].as_str().unwrap())
        .collect();
    assert_eq!(upcoming, vec!["OP/01"]);
}

#[tokio::test]
async fn test_bad_queries() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let resp = reqwest::get(format!("{}/records?module=finance", base)).await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = reqwest::get(format!("{}/records?code=ZZ/01", base)).await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = reqwest::get(format!("{}/activity?limit=0", base)).await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_file_review_cascade_over_http() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let (status, body) = post_json(
        &base,
        "/records/file-review",
        json!({ "code": "OP/01", "fileId": "ops-batch/B-001.pdf", "status": "approved", "actor": "Lee" }),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["cascaded"], false);
    assert_eq!(body["cells"], json!(["P2"]));

    let (status, body) = post_json(
        &base,
        "/records/file-review",
        json!({ "code": "OP/01", "fileId": "ops-batch/B-002.pdf", "status": "approved", "actor": "Lee" }),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["cascaded"], true);
    assert_eq!(body["record"]["auditStatus"], "Approved");

    let modules = get_json(&base, "/modules").await;
    assert_eq!(modules[0]["readiness"]["status"], "compliant");
    assert_eq!(modules[0]["readiness"]["progress"], 100);
}

#[tokio::test]
async fn test_mutation_errors() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let (status, body) = post_json(
        &base,
        "/records/status",
        json!({ "code": "QA/05", "status": "done", "actor": "Lee" }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "invalid_status");

    let (status, body) = post_json(
        &base,
        "/records/file-review",
        json!({ "code": "OP/01", "fileId": "nope.pdf", "status": "approved", "actor": "Lee" }),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = post_json(
        &base,
        "/records/reviewed",
        json!({ "code": "QA/05", "checked": true, "actor": "  " }),
    )
    .await;
    assert_eq!(status, 400);

    let (status, body) = post_json(
        &base,
        "/records/reviewed",
        json!({ "code": "QA/05", "checked": true, "actor": "Lee" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["record"]["reviewed"], true);
    assert_eq!(body["record"]["reviewedBy"], "Lee");
}
