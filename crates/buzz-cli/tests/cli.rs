//! CLI command integration tests.
//! Each test uses a temp directory via BUZZ_DATA_DIR for full isolation and
//! points the upstream at a closed local port, so every lookup falls back.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const OFFLINE_UPSTREAM: &str = "http://127.0.0.1:1";

fn buzz_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("buzz").unwrap();
    cmd.env("BUZZ_DATA_DIR", data_dir.path())
        .env("BUZZ_UPSTREAM_URL", OFFLINE_UPSTREAM);
    cmd
}

/// Data dir whose config removes all artificial delays.
fn fast_data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("buzz.toml"),
        "min_delay_ms = 0\ninter_target_delay_ms = 0\nrequest_timeout_secs = 2\n",
    )
    .unwrap();
    dir
}

fn add_target(dir: &TempDir, name: &str, term: &str) {
    buzz_cmd(dir)
        .args(["targets", "add", name, "--term", term])
        .assert()
        .success();
}

#[test]
fn targets_add_then_list() {
    let dir = fast_data_dir();
    buzz_cmd(&dir)
        .args(["targets", "add", "Trump", "--term", "donald trump"])
        .assert()
        .success()
        .stdout(predicate::str::contains("added Trump"));
    add_target(&dir, "Bitcoin", "bitcoin");

    buzz_cmd(&dir)
        .args(["targets", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Trump"))
        .stdout(predicate::str::contains("\"donald trump\""))
        .stdout(predicate::str::contains("Bitcoin"))
        .stdout(predicate::str::contains("active"));
}

#[test]
fn targets_list_empty() {
    let dir = fast_data_dir();
    buzz_cmd(&dir)
        .args(["targets", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no targets)"));
}

#[test]
fn duplicate_target_is_rejected() {
    let dir = fast_data_dir();
    add_target(&dir, "Gold", "gold price");
    buzz_cmd(&dir)
        .args(["targets", "add", "Gold"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Gold"));
}

#[test]
fn disable_and_enable_target() {
    let dir = fast_data_dir();
    add_target(&dir, "Oil", "oil");

    buzz_cmd(&dir)
        .args(["targets", "disable", "Oil"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled Oil"));
    buzz_cmd(&dir)
        .args(["targets", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"));

    buzz_cmd(&dir)
        .args(["targets", "enable", "Oil"])
        .assert()
        .success()
        .stdout(predicate::str::contains("enabled Oil"));
}

#[test]
fn unknown_target_fails() {
    let dir = fast_data_dir();
    buzz_cmd(&dir)
        .args(["history", "nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown target 'nobody'"));
}

#[test]
fn score_falls_back_when_upstream_unreachable() {
    let dir = fast_data_dir();
    let output = buzz_cmd(&dir)
        .args(["score", "elon musk", "--geo", "US", "--timeframe", "today 1-m"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["source"], "fallback");
    assert_eq!(result["geo"], "US");
    assert_eq!(result["timeframe"], "today 1-m");
    let score = result["attention_score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score), "{score}");
}

#[test]
fn score_rejects_unknown_timeframe() {
    let dir = fast_data_dir();
    buzz_cmd(&dir)
        .args(["score", "rust", "--timeframe", "someday"])
        .assert()
        .failure();
}

#[test]
fn regions_empty_when_upstream_unreachable() {
    let dir = fast_data_dir();
    buzz_cmd(&dir)
        .args(["regions", "rust"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no regional data)"));
}

#[test]
fn serve_once_records_history() {
    let dir = fast_data_dir();
    add_target(&dir, "Trump", "donald trump");
    add_target(&dir, "Apple", "apple stock");

    buzz_cmd(&dir)
        .args(["serve", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("updated 2 targets"))
        .stdout(predicate::str::contains("2 fallback"));

    buzz_cmd(&dir)
        .args(["history", "Trump"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fallback"))
        .stdout(predicate::str::contains("0.2"));

    buzz_cmd(&dir)
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("targets:     2 (2 active)"))
        .stdout(predicate::str::contains("cycles:      1"))
        .stdout(predicate::str::contains("serve:       not running"));
}

#[test]
fn serve_once_twice_appends_history() {
    let dir = fast_data_dir();
    add_target(&dir, "Gold", "gold");

    for _ in 0..2 {
        buzz_cmd(&dir).args(["serve", "--once"]).assert().success();
    }

    let output = buzz_cmd(&dir)
        .args(["history", "Gold"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rows = String::from_utf8(output).unwrap().lines().count();
    assert_eq!(rows, 2);
}

#[test]
fn densify_without_history_is_empty() {
    let dir = fast_data_dir();
    add_target(&dir, "Gold", "gold");
    buzz_cmd(&dir)
        .args(["densify", "Gold"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn densify_after_serve_emits_grid() {
    let dir = fast_data_dir();
    add_target(&dir, "Gold", "gold");
    buzz_cmd(&dir).args(["serve", "--once"]).assert().success();

    let output = buzz_cmd(&dir)
        .args(["densify", "Gold", "--step-secs", "60"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let points: Vec<serde_json::Value> = serde_json::from_slice(&output).unwrap();
    assert!(!points.is_empty());
    let value = points[0]["value"].as_f64().unwrap();
    for point in &points {
        assert_eq!(point["value"].as_f64().unwrap(), value);
        assert!(point["source_timestamp"].is_i64());
    }
}

#[test]
fn densify_rejects_non_positive_step() {
    let dir = fast_data_dir();
    add_target(&dir, "Gold", "gold");
    buzz_cmd(&dir)
        .args(["densify", "Gold", "--step-secs", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be positive"));
}

#[test]
fn status_fresh_data_dir() {
    let dir = fast_data_dir();
    buzz_cmd(&dir)
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cycles:      0"))
        .stdout(predicate::str::contains("last update: never"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("buzz.toml"), "no_such_key = 1\n").unwrap();
    buzz_cmd(&dir)
        .args(["score", "rust"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("buzz.toml"));
}
