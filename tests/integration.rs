use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn plog_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("plog");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[storage]
root = "{}/logs"
project_name = "Confidant"

[summary]
default_window_days = 30
"#,
        root.display()
    );

    let config_path = config_dir.join("plog.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_plog(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = plog_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run plog binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn logged_id(stdout: &str) -> String {
    stdout
        .split_whitespace()
        .last()
        .unwrap_or_else(|| panic!("no id in output: {}", stdout))
        .to_string()
}

#[test]
fn test_init_creates_layout() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_plog(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Project log 'Confidant' ready"));

    let logs = tmp.path().join("logs");
    for dir in ["meetings", "requirements", "milestones", "reports"] {
        assert!(logs.join(dir).is_dir(), "{} missing", dir);
    }
    let meta: Value =
        serde_json::from_str(&fs::read_to_string(logs.join("project.json")).unwrap()).unwrap();
    assert_eq!(meta["project_name"], "Confidant");
    assert_eq!(meta["status"], "Active");
}

#[test]
fn test_init_idempotent() {
    let (tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_plog(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let before = fs::read(tmp.path().join("logs/project.json")).unwrap();

    let (stdout, _, success2) = run_plog(&config_path, &["init", "--name", "Renamed"]);
    assert!(success2, "Second init failed (not idempotent)");
    assert!(stdout.contains("'Confidant'"));
    assert_eq!(fs::read(tmp.path().join("logs/project.json")).unwrap(), before);
}

#[test]
fn test_log_and_summarize() {
    let (tmp, config_path) = setup_test_env();
    run_plog(&config_path, &["init"]);

    let (stdout, stderr, success) = run_plog(
        &config_path,
        &[
            "meeting",
            "--participant",
            "Alice",
            "--participant",
            "Bob",
            "--decision",
            "Use local storage",
        ],
    );
    assert!(success, "meeting failed: {}", stderr);
    let id = logged_id(&stdout);
    assert!(id.starts_with("meeting_"));
    assert!(tmp
        .path()
        .join("logs/meetings")
        .join(format!("{}.json", id))
        .exists());

    let (_, stderr, success) = run_plog(
        &config_path,
        &[
            "milestone",
            "--name",
            "Design",
            "--status",
            "completed",
            "--achievement",
            "Design done",
            "--at",
            "2020-01-01T00:00:00",
        ],
    );
    assert!(success, "milestone failed: {}", stderr);

    let (stdout, stderr, success) = run_plog(&config_path, &["summary", "--json"]);
    assert!(success, "summary failed: {}", stderr);
    let summary: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["project_name"], "Confidant");
    assert_eq!(summary["counts"]["meetings"], 1);
    assert_eq!(summary["counts"]["milestones"], 0);
    assert_eq!(summary["decisions"][0], "Use local storage");

    let (stdout, _, success) = run_plog(&config_path, &["summary"]);
    assert!(success);
    assert!(stdout.contains("Confidant (Last 30 days)"));
    assert!(stdout.contains("- Use local storage"));
}

#[test]
fn test_requirement_defaults_and_context_filter() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_plog(
        &config_path,
        &["requirement", "--change", "Add CSV export", "--rationale", "Finance asked"],
    );
    assert!(success, "requirement failed: {}", stderr);

    let (stdout, _, success) = run_plog(&config_path, &["context"]);
    assert!(success);
    assert!(stdout.contains("[General]: Add CSV export"));

    let (stdout, _, success) = run_plog(&config_path, &["context", "--category", "csv"]);
    assert!(success);
    let filtered: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(filtered["requirement_changes"][0]["proposed_by"], "Unknown");
}

#[test]
fn test_report_writes_new_file_each_time() {
    let (tmp, config_path) = setup_test_env();
    run_plog(&config_path, &["meeting", "--participant", "Alice"]);

    let (stdout1, stderr, success) = run_plog(&config_path, &["report", "--days", "7"]);
    assert!(success, "report failed: {}", stderr);
    assert!(stdout1.contains("meetings: 1"));
    let (stdout2, _, success) = run_plog(&config_path, &["report", "--days", "7"]);
    assert!(success);
    assert_ne!(stdout1.lines().next(), stdout2.lines().next());

    let count = fs::read_dir(tmp.path().join("logs/reports")).unwrap().count();
    assert_eq!(count, 2);
}

#[test]
fn test_invalid_input_fails() {
    let (tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_plog(&config_path, &["summary", "--days", "0"]);
    assert!(!success);
    assert!(stderr.contains("window_days"), "stderr: {}", stderr);

    let (_, _, success) = run_plog(&config_path, &["milestone", "--name", "X", "--status", "someday"]);
    assert!(!success);

    let (_, _, success) = run_plog(&config_path, &["meeting", "--participant", "  "]);
    assert!(!success);
    assert!(!tmp.path().join("logs/meetings").exists());
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_plog(&tmp.path().join("nope.toml"), &["summary"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_init_without_config_uses_default_root() {
    let tmp = TempDir::new().unwrap();
    let run = |args: &[&str]| {
        Command::new(plog_binary())
            .current_dir(tmp.path())
            .args(args)
            .env("RUST_LOG", "off")
            .output()
            .unwrap()
    };

    let output = run(&["init"]);
    assert!(
        output.status.success(),
        "init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let meta: Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join("project_logs/project.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(meta["project_name"], "Unnamed Project");
    assert!(tmp.path().join("project_logs/meetings").is_dir());

    // Only init falls back; other commands still need a config file.
    let output = run(&["summary"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read config file"));
}
