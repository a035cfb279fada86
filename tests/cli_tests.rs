//! Command line tests for the `rowbind` binary.

use assert_cmd::Command;
use std::fs;
use tempfile::TempDir;

fn rowbind() -> Command {
    Command::cargo_bin("rowbind").unwrap()
}

#[test]
fn test_prints_tab_separated_rows() {
    rowbind()
        .args(["--sqlite", ":memory:", "i,s", "SELECT 42, 'x' UNION ALL SELECT 7, 'y'"])
        .assert()
        .success()
        .stdout("42\tx\n7\ty\n");
}

#[test]
fn test_prints_json_rows() {
    rowbind()
        .args(["--sqlite", ":memory:", "--json", "i,s,d", "SELECT 1, NULL, '2024-05-06'"])
        .assert()
        .success()
        .stdout("[1,\"\",\"2024-05-06\"]\n");
}

#[test]
fn test_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("demo.db");
    let config = dir.path().join("rowbind.toml");
    fs::write(
        &config,
        format!(
            "[connection]\nbackend = \"sqlite\"\ndatabase = '{}'\n\n[features]\nauto_trim = true\n",
            db.display()
        ),
    )
    .unwrap();

    rowbind()
        .arg("--config")
        .arg(&config)
        .args(["s", "SELECT 'padded   '"])
        .assert()
        .success()
        .stdout("padded\n");
}

#[test]
fn test_reports_query_failure() {
    rowbind()
        .args(["--sqlite", ":memory:", "i", "SELECT n FROM missing"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_usage_on_missing_arguments() {
    rowbind().args(["i"]).assert().code(2);
}
