//! Integration tests for the pscape CLI commands.
#![allow(deprecated)] // Command::cargo_bin – macro replacement not yet stable

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SMALL_PARAMS: &str = r#"model:
  start_date: 2000-01-01
  end_date: 2000-03-01
  time_delta_days: 7
  seed: 5
setup:
  n_households: 4
  n_animals: 60
world:
  width: 8
  height: 8
  villages:
    - row: 2
      col: 2
      paths:
        - [[2, 6], [6, 6]]
    - row: 6
      col: 1
"#;

/// A temp directory holding a small, fast parameter file.
fn small_params() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("params.yaml");
    fs::write(&path, SMALL_PARAMS).unwrap();
    let path = path.to_str().unwrap().to_owned();
    (dir, path)
}

fn pscape() -> Command {
    Command::cargo_bin("pscape").unwrap()
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_loadable_template() {
    let parent = TempDir::new().unwrap();
    pscape()
        .args(["init", "herds"])
        .current_dir(parent.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Created parameter file herds.yaml"));

    let written = parent.path().join("herds.yaml");
    assert!(written.exists());
    pscape()
        .args(["check", "--params", written.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("All checks passed"));
}

#[test]
fn init_fails_if_file_exists() {
    let parent = TempDir::new().unwrap();
    fs::write(parent.path().join("herds.yaml"), "").unwrap();

    pscape()
        .args(["init", "herds.yaml"])
        .current_dir(parent.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_lists_scheduled_events() {
    let (_dir, params) = small_params();
    pscape()
        .args(["check", "--params", &params])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("All checks passed")
                .and(predicate::str::contains("4 households, 60 animals, 2 villages"))
                .and(predicate::str::contains("world-step"))
                .and(predicate::str::contains("cull-old-age")),
        );
}

#[test]
fn check_rejects_invalid_parameters() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "model:\n  time_delta_days: 0\n").unwrap();

    pscape()
        .args(["check", "--params", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("time_delta_days"));
}

#[test]
fn check_reports_malformed_yaml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "model: [unclosed").unwrap();

    pscape()
        .args(["check", "--params", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YAML"));
}

#[test]
fn check_missing_file() {
    pscape()
        .args(["check", "--params", "/nonexistent/params.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_prints_summary_table() {
    let (_dir, params) = small_params();
    pscape()
        .args(["run", "--params", &params])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Results")
                .and(predicate::str::contains("Births"))
                .and(predicate::str::contains("agent-step")),
        );
}

#[test]
fn run_json_covers_every_seed() {
    let (_dir, params) = small_params();
    let output = pscape()
        .args(["run", "--params", &params, "--seed", "10", "--seeds", "3", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let seeds: Vec<u64> = summaries
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["seed"].as_u64().unwrap())
        .collect();
    assert_eq!(seeds, vec![10, 11, 12]);
    assert_eq!(summaries[0]["animals_start"], 60);
    assert_eq!(summaries[0]["events"]["agent-step"], 9);
}

#[test]
fn run_max_records_caps_herd_series() {
    let (_dir, params) = small_params();
    let herd_records = |extra: &[&str]| {
        let output = pscape()
            .args(["run", "--params", &params, "--json"])
            .args(extra)
            .output()
            .unwrap();
        assert!(output.status.success());
        let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        summaries[0]["herd_records"].as_u64().unwrap()
    };
    // 4 herds over 9 agent steps.
    assert_eq!(herd_records(&[]), 36);
    assert_eq!(herd_records(&["--max-records", "5"]), 5);
}

#[test]
fn run_is_reproducible() {
    let (_dir, params) = small_params();
    let once = || {
        pscape()
            .args(["run", "--params", &params, "--json"])
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(once(), once());
}

#[test]
fn verbose_logs_go_to_stderr() {
    let (_dir, params) = small_params();
    pscape()
        .args(["--verbose", "run", "--params", &params, "--json"])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("["))
        .stderr(predicate::str::contains("run started"));
}
