use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn shelf_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("shelf");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Nothing listens on port 9: every search page fails fast, which is
    // exactly the all-pages-failed path.
    let config_content = format!(
        r#"[storage]
db_path = "{root}/data/shelfwatch.sqlite"

[marketplace]
search_url = "http://127.0.0.1:9/search"
brand = "Northloom"
phrases = ["mens pajama set", "jersey"]
max_pages = 2
timeout_secs = 2

[products]
"260800583" = "NL-PJ-BK-0924"

[report]
output_dir = "{root}/reports"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("shelfwatch.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_shelf(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = shelf_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run shelf binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_shelf(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/shelfwatch.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_shelf(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_shelf(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_status_on_empty_history() {
    let (_tmp, config_path) = setup_test_env();

    run_shelf(&config_path, &["init"]);
    let (stdout, stderr, success) = run_shelf(&config_path, &["status"]);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("no positions recorded yet"));
}

#[test]
fn test_report_on_empty_history() {
    let (_tmp, config_path) = setup_test_env();

    run_shelf(&config_path, &["init"]);
    let (stdout, _, success) = run_shelf(&config_path, &["report"]);
    assert!(success, "report on empty history must not fail");
    assert!(stdout.contains("nothing to report"));
}

#[test]
fn test_track_dry_run_survives_unreachable_marketplace() {
    let (_tmp, config_path) = setup_test_env();

    run_shelf(&config_path, &["init"]);
    // Every page fails against the unroutable endpoint: the cycle must
    // complete with an empty batch instead of erroring out.
    let (stdout, stderr, success) = run_shelf(&config_path, &["track", "--dry-run"]);
    assert!(success, "dry-run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("observations fetched: 0"));
    assert!(stdout.contains("no product cards found"));
}

#[test]
fn test_missing_config_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (_, stderr, success) = run_shelf(&missing, &["status"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        r#"[storage]
db_path = "./x.sqlite"

[marketplace]
search_url = "http://127.0.0.1:9/search"
brand = "Northloom"
phrases = []
"#,
    )
    .unwrap();

    let (_, stderr, success) = run_shelf(&bad, &["init"]);
    assert!(!success);
    assert!(stderr.contains("phrases"));
}
