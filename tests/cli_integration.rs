// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Integration tests for the mavenfeed CLI commands
//!
//! None of these touch the network: commands that would collect are run
//! with the lock already held.

use assert_cmd::Command;
use chrono::Utc;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Run mavenfeed against an isolated data directory and empty config file
fn mavenfeed(data_dir: &TempDir) -> Command {
    let config = data_dir.path().join("mavenfeed.toml");
    if !config.exists() {
        fs::write(&config, "").unwrap();
    }
    let mut cmd = Command::cargo_bin("mavenfeed").unwrap();
    cmd.env("MAVENFEED_DATA_DIR", data_dir.path())
        .env("MAVENFEED_CONFIG", &config)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn write(data_dir: &TempDir, relative: &str, content: &str) {
    let path = data_dir.path().join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_status_on_empty_data_dir() {
    let data_dir = TempDir::new().unwrap();

    let output = mavenfeed(&data_dir).args(["status", "--json"]).output().unwrap();
    assert!(output.status.success());

    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["watermark"], 0);
    assert_eq!(status["indexed"], 0);
    assert_eq!(status["queued"], 0);
    assert_eq!(status["locked"], false);
}

#[test]
fn test_status_human_output() {
    let data_dir = TempDir::new().unwrap();
    write(&data_dir, "Maven/Artifact/_index.json", r#"{"ts_update": 1700000000000}"#);
    write(&data_dir, "Maven/Version/_index.json", r#"{"list": ["org.a:b", "org.c:d"]}"#);

    mavenfeed(&data_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"Watermark:\s+1700000000000").unwrap())
        .stdout(predicate::str::is_match(r"Indexed:\s+2").unwrap());
}

#[test]
fn test_compact_rewrites_queue() {
    let data_dir = TempDir::new().unwrap();
    write(&data_dir, "Queue/ReleaseQueue.txt", "1000|org.a|b\n2000|org.a|b\n500|org.c|d\nbroken\n");

    mavenfeed(&data_dir)
        .args(["compact", "--expiry-mins", "100000000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 kept"))
        .stdout(predicate::str::contains("1 malformed"));

    assert_eq!(
        fs::read_to_string(data_dir.path().join("Queue/ReleaseQueue.txt")).unwrap(),
        "500|org.c|d\n2000|org.a|b\n"
    );
}

#[test]
fn test_compact_drops_expired_entries() {
    let data_dir = TempDir::new().unwrap();
    let recent = Utc::now().timestamp_millis() - 60_000;
    write(&data_dir, "Queue/ReleaseQueue.txt", &format!("1000|org.old|x\n{recent}|org.new|y\n"));

    mavenfeed(&data_dir).arg("compact").assert().success();

    assert_eq!(
        fs::read_to_string(data_dir.path().join("Queue/ReleaseQueue.txt")).unwrap(),
        format!("{recent}|org.new|y\n")
    );
}

#[test]
fn test_feed_from_queue_and_documents() {
    let data_dir = TempDir::new().unwrap();
    let recent = Utc::now().timestamp_millis() - 60_000;
    write(
        &data_dir,
        "Maven/Artifact/org/example/demo.json",
        &serde_json::json!({
            "id": "org.example:demo",
            "group_id": "org.example",
            "artifact_id": "demo",
            "version_latest": "1.2.0",
            "ts_publish": recent,
            "description": "Demo library",
            "dsv": 1
        })
        .to_string(),
    );
    write(&data_dir, "Badge/org/example/demo.svg", "<svg/>");
    write(
        &data_dir,
        "Queue/ReleaseQueue.txt",
        &format!("{recent}|org.example|demo\n{recent}|org.example|missing\n"),
    );

    mavenfeed(&data_dir).arg("feed").assert().success();

    let feed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(data_dir.path().join("Feed/ReleaseQueue.json")).unwrap()).unwrap();
    assert_eq!(feed["version"], "https://jsonfeed.org/version/1.1");
    let items = feed["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "org.example:demo@1.2.0");
    assert_eq!(items[0]["title"], "org.example:demo 1.2.0 released, Demo library");
    assert_eq!(items[0]["attachments"][0]["size_in_bytes"], 6);

    // The feed command leaves the queue file alone
    assert!(fs::read_to_string(data_dir.path().join("Queue/ReleaseQueue.txt"))
        .unwrap()
        .contains("missing"));
}

#[test]
fn test_collect_exits_cleanly_when_locked() {
    let data_dir = TempDir::new().unwrap();
    write(&data_dir, ".mavenfeed.lock", "1\n");

    mavenfeed(&data_dir)
        .arg("collect")
        .assert()
        .success()
        .stderr(predicate::str::contains("Another run holds the lock"));

    assert!(!data_dir.path().join("Maven").exists());
    assert!(data_dir.path().join(".mavenfeed.lock").exists());
}

#[test]
fn test_default_command_is_collect() {
    let data_dir = TempDir::new().unwrap();
    write(&data_dir, ".mavenfeed.lock", "1\n");

    mavenfeed(&data_dir)
        .assert()
        .success()
        .stderr(predicate::str::contains("Another run holds the lock"));
}

#[test]
fn test_invalid_config_fails() {
    let data_dir = TempDir::new().unwrap();
    write(&data_dir, "mavenfeed.toml", "[collect]\ndeep_scan_day = \"someday\"\n");

    mavenfeed(&data_dir).arg("status").assert().failure();
}

#[test]
fn test_zero_page_cap_config_fails() {
    let data_dir = TempDir::new().unwrap();
    write(&data_dir, "mavenfeed.toml", "[collect]\nmax_incremental_pages = 0\n");

    mavenfeed(&data_dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_incremental_pages"));
}

#[test]
fn test_completions() {
    let data_dir = TempDir::new().unwrap();

    mavenfeed(&data_dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mavenfeed"));
}
