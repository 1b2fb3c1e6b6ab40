#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const FIXTURES: &str = r#"
chats:
  - identifier: echo
    endpoint: fake://echo
    model: fake
  - identifier: offline
    endpoint: http://127.0.0.1:9/v1
    model: gpt-4o-mini
cases:
  - name: cough-fever
    input: "1. Bronchitis\n2. Pneumonia"
    groups: [G]
    diagnoses:
      - name: Pneumonia
        pattern: pneumonia | (cough & fever)
  - name: wheeze
    input: "1. Asthma"
    groups: [G]
    diagnoses:
      - name: COPD
        pattern: copd
"#;

fn ddx(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ddx").unwrap();
    cmd.arg("--db")
        .arg(db)
        .env("RUST_LOG", "warn")
        .env_remove("DDX_CONFIG")
        .env_remove("DDX_PARALLEL")
        .env_remove("DDX_TIMEOUT_SECONDS");
    cmd
}

fn imported(dir: &Path) -> PathBuf {
    let fixtures = dir.join("fixtures.yaml");
    fs::write(&fixtures, FIXTURES).unwrap();
    let db = dir.join("ddx.db");
    ddx(&db)
        .arg("import")
        .arg(&fixtures)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported 2 chats, 1 groups, 2 cases"));
    db
}

#[test]
fn run_ranks_echoed_suggestions() {
    let dir = tempdir().unwrap();
    let db = imported(dir.path());

    ddx(&db)
        .args(["run", "G", "echo"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Run 1 [completed] group=G chat=echo"))
        .stdout(predicate::str::contains("cough-fever: Pneumonia #2"))
        .stdout(predicate::str::contains("wheeze: COPD -"));

    let out = ddx(&db)
        .args(["report", "1", "--format", "json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["cases"][0]["response"], "1. Bronchitis\n2. Pneumonia");
    assert_eq!(v["cases"][0]["ranks"][0]["rank"], 2);
    assert_eq!(v["misses"], 1);
}

#[test]
fn worker_mode_completes() {
    let dir = tempdir().unwrap();
    let db = imported(dir.path());
    ddx(&db)
        .args(["run", "G", "echo", "--worker", "--parallel", "2"])
        .assert()
        .code(0);
    ddx(&db)
        .args(["status", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn unknown_group_is_a_usage_error() {
    let dir = tempdir().unwrap();
    let db = imported(dir.path());
    ddx(&db)
        .args(["run", "nope", "echo"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("TestGroup 'nope' does not exist"))
        .stderr(predicate::str::contains("\"G\""));
    ddx(&db)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn cancelled_run_cannot_be_started() {
    let dir = tempdir().unwrap();
    let db = imported(dir.path());

    let out = ddx(&db).args(["create", "G", "echo"]).output().unwrap();
    assert!(out.status.success());
    let run_id = String::from_utf8(out.stdout).unwrap().trim().to_string();

    ddx(&db).args(["cancel", &run_id]).assert().success();
    ddx(&db).args(["start", &run_id]).assert().code(2);
    ddx(&db)
        .args(["status", &run_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("cancelled"));
}

#[test]
fn unreachable_endpoint_fails_the_run() {
    let dir = tempdir().unwrap();
    let db = imported(dir.path());
    ddx(&db)
        .args(["run", "G", "offline", "--timeout-seconds", "2"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Run 1 [failed] group=G chat=offline"))
        .stdout(predicate::str::contains("error (case"));
}
