use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn qms_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("qms");
    path
}

const SHEET: &str = r#"{
  "values": [
    ["Category", "Code", "Name", "Description", "When to fill", "Template", "Folder", "Last serial", "Last file date"],
    ["01-Sales", "SL/01", "Customer feedback", "", "Monthly", "", "sales-fb"],
    ["03-Quality", "QA/02", "Calibration record", "", "Weekly", "", "qa-cal", "", "2024-01-01"],
    ["05-HR", "HR/03", "Training attendance", "", "As needed", "", "No Files Yet"],
    ["📂 Quality", "📂 Folder"]
  ]
}"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let folders = root.join("folders");
    fs::create_dir_all(folders.join("sales-fb")).unwrap();
    fs::create_dir_all(folders.join("qa-cal")).unwrap();
    fs::write(folders.join("sales-fb").join("SL-01-001.pdf"), b"%PDF").unwrap();
    fs::write(folders.join("sales-fb").join("SL-01-002.pdf"), b"%PDF").unwrap();

    fs::write(root.join("sheet.json"), SHEET).unwrap();

    let config_content = format!(
        r#"[sheet]
backend = "file"
path = "{}/sheet.json"

[drive]
backend = "filesystem"
root = "{}/folders"

[server]
bind = "127.0.0.1:7341"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("qms.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_qms(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = qms_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run qms binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn run_json(config_path: &Path, args: &[&str]) -> Value {
    let mut full: Vec<&str> = args.to_vec();
    full.push("--json");
    let (stdout, stderr, success) = run_qms(config_path, &full);
    assert!(success, "{:?} failed: stdout={}, stderr={}", args, stdout, stderr);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("bad JSON from {:?}: {}\n{}", args, e, stdout))
}

fn sheet_cell(config_path: &Path, row: usize, col: usize) -> String {
    let sheet = config_path.parent().unwrap().parent().unwrap().join("sheet.json");
    let parsed: Value = serde_json::from_str(&fs::read_to_string(sheet).unwrap()).unwrap();
    parsed["values"][row - 1][col].as_str().unwrap_or_default().to_string()
}

#[test]
fn test_sources_lists_local_backends() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_qms(&config_path, &["sources"]);
    assert!(success, "sources failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("sheet:file"));
    assert!(stdout.contains("drive:filesystem"));
}

#[test]
fn test_records_merge_sheet_and_folders() {
    let (_tmp, config_path) = setup_test_env();
    let records = run_json(&config_path, &["records"]);
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 3, "folder header row must be skipped");

    let sales = &records[0];
    assert_eq!(sales["code"], "SL/01");
    assert_eq!(sales["actualRecordCount"], 2);
    assert_eq!(sales["isOverdue"], false);

    let quality = &records[1];
    assert_eq!(quality["actualRecordCount"], 0);
    assert_eq!(quality["isOverdue"], true);

    let overdue = run_json(&config_path, &["records", "--overdue"]);
    assert_eq!(overdue.as_array().unwrap().len(), 1);

    let hr = run_json(&config_path, &["records", "--module", "hr"]);
    assert_eq!(hr[0]["code"], "HR/03");
}

#[test]
fn test_unknown_module_is_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_qms(&config_path, &["records", "--module", "finance"]);
    assert!(!success);
    assert!(stderr.contains("Unknown module"));
}

#[test]
fn test_modules_and_summary() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_qms(&config_path, &["modules"]);
    assert!(success, "modules failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Sales & Customer Service"));
    assert!(stdout.contains("In Progress"));

    let summary = run_json(&config_path, &["summary"]);
    assert_eq!(summary["audit"]["total"], 3);
    assert_eq!(summary["audit"]["pending"], 2);
    assert_eq!(summary["audit"]["complianceRate"], 0);
    assert_eq!(summary["complete"], true);
    assert_eq!(summary["monthly"]["currentMonth"], 1);
}

#[test]
fn test_pending_and_activity() {
    let (_tmp, config_path) = setup_test_env();

    let pending = run_json(&config_path, &["pending"]);
    let overdue = pending["overdue"].as_array().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0]["code"], "QA/02");

    let activity = run_json(&config_path, &["activity", "--limit", "2"]);
    let activity = activity.as_array().unwrap();
    assert_eq!(activity.len(), 2);
    assert_eq!(activity[0]["code"], "SL/01");
    assert_eq!(activity[0]["kind"], "pending");
}

#[test]
fn test_review_cascade_persists_to_sheet() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_qms(
        &config_path,
        &["review-file", "SL/01", "sales-fb/SL-01-001.pdf", "approved", "--actor", "Dana"],
    );
    assert!(success, "review-file failed: stdout={}, stderr={}", stdout, stderr);
    assert!(!stdout.contains("promoted"));

    let (stdout, stderr, success) = run_qms(
        &config_path,
        &[
            "review-file",
            "SL/01",
            "sales-fb/SL-01-002.pdf",
            "approved",
            "--comment",
            "signed",
            "--actor",
            "Dana",
        ],
    );
    assert!(success, "review-file failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("promoted to Approved"));

    let ledger: Value = serde_json::from_str(&sheet_cell(&config_path, 2, 15)).unwrap();
    assert_eq!(ledger["recordStatus"], "approved");
    assert_eq!(ledger["recordReviewedBy"], "Dana");
    assert_eq!(ledger["sales-fb/SL-01-002.pdf"]["comment"], "signed");

    let audit = run_json(&config_path, &["audit"]);
    assert_eq!(audit["complianceRate"], 100);
    assert_eq!(audit["compliant"].as_array().unwrap().len(), 2);
}

#[test]
fn test_mark_reviewed_and_clear() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_qms(&config_path, &["mark-reviewed", "HR/03", "--actor", "Omar"]);
    assert!(success, "mark-reviewed failed: {}", stderr);
    assert_eq!(sheet_cell(&config_path, 4, 17), "TRUE");
    assert_eq!(sheet_cell(&config_path, 4, 13), "Omar");

    let (_, stderr, success) =
        run_qms(&config_path, &["mark-reviewed", "HR/03", "--clear", "--actor", "Omar"]);
    assert!(success, "mark-reviewed --clear failed: {}", stderr);
    assert_eq!(sheet_cell(&config_path, 4, 17), "FALSE");
    assert_eq!(sheet_cell(&config_path, 4, 13), "");
}

#[test]
fn test_invalid_status_fails_without_writing() {
    let (_tmp, config_path) = setup_test_env();
    let before = fs::read_to_string(config_path.parent().unwrap().parent().unwrap().join("sheet.json")).unwrap();

    let (_, stderr, success) =
        run_qms(&config_path, &["set-status", "SL/01", "done", "--actor", "Dana"]);
    assert!(!success);
    assert!(stderr.contains("invalid status 'done'"));

    let after = fs::read_to_string(config_path.parent().unwrap().parent().unwrap().join("sheet.json")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_unknown_record_and_file() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_qms(&config_path, &["show", "ZZ/99"]);
    assert!(!success);
    assert!(stderr.contains("no record with code 'ZZ/99'"));

    let (_, stderr, success) = run_qms(
        &config_path,
        &["review-file", "SL/01", "missing.pdf", "approved", "--actor", "Dana"],
    );
    assert!(!success);
    assert!(stderr.contains("has no file 'missing.pdf'"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_qms(&tmp.path().join("nope.toml"), &["records"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
