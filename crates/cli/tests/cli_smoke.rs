//! Binary-level smoke tests.

use assert_cmd::Command;
use std::io::Write;
use std::path::Path;

fn write_transcript(root: &Path) {
    let sessions = root.join("sessions");
    std::fs::create_dir_all(&sessions).expect("mkdir");
    let mut file = std::fs::File::create(sessions.join("s1.jsonl")).expect("create");
    writeln!(
        file,
        r#"{{"type":"message","timestamp":"2026-07-01T10:00:00Z","message":{{"role":"user","content":"the glicko rating pipeline needs recalibration"}}}}"#
    )
    .expect("write");
}

#[test]
fn index_build_then_search_finds_content() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    write_transcript(dir.path());

    Command::cargo_bin("recall")
        .expect("binary")
        .args(["--workspace"])
        .arg(dir.path())
        .args(["index", "build"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Indexed 1 sessions"));

    Command::cargo_bin("recall")
        .expect("binary")
        .args(["--workspace"])
        .arg(dir.path())
        .args(["search", "glicko rating", "--json"])
        .assert()
        .success()
        .stdout(predicates::str::contains("sessions/s1.jsonl"))
        .stdout(predicates::str::contains("\"searchPath\": \"index\""));
}

#[test]
fn index_status_reports_staleness() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    write_transcript(dir.path());

    // No index yet: stale with an explicit reason.
    Command::cargo_bin("recall")
        .expect("binary")
        .args(["--workspace"])
        .arg(dir.path())
        .args(["index", "status"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"stale\": true"));
}

#[test]
fn stats_on_fresh_workspace_is_empty() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    Command::cargo_bin("recall")
        .expect("binary")
        .args(["--workspace"])
        .arg(dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicates::str::contains("\"totalSearches\": 0"));
}
