// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Status command - show persisted run state

use super::Output;
use crate::config::Config;
use crate::schedule::{local_date, plan_run, week_key, RunMode};
use crate::store::{FileStateStore, StateStore};
use crate::types::{format_millis, ReleaseQueueEntry};
use anyhow::Result;
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::PathBuf;

/// Snapshot of the persisted state
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    /// Data directory
    pub data_dir: PathBuf,
    /// Watermark in epoch milliseconds, 0 when unknown
    pub watermark: i64,
    /// Watermark in the display offset
    pub watermark_time: Option<String>,
    /// Week of the last successful deep scan
    pub weekly_flag: Option<String>,
    /// Current week key
    pub current_week: String,
    /// Whether the next run would deep scan
    pub deep_scan_due: bool,
    /// Identities in the index
    pub indexed: usize,
    /// Valid release queue lines
    pub queued: usize,
    /// Whether a run lock is present
    pub locked: bool,
}

/// Read the status at `now`
pub fn read_status(cfg: &Config, now: DateTime<Utc>) -> Result<Status> {
    let store = FileStateStore::new(cfg);
    let offset = cfg.collect.offset()?;
    let today = local_date(now, offset);
    let watermark = store.watermark()?;
    let weekly_flag = store.weekly_flag()?;
    let deep_scan_due =
        plan_run(today, cfg.collect.deep_scan_weekday()?, weekly_flag.as_deref()) == RunMode::DeepScan;
    let queued = store
        .read_release_queue()?
        .lines()
        .filter(|l| ReleaseQueueEntry::parse_line(l).is_some())
        .count();

    Ok(Status {
        data_dir: cfg.data_dir.clone(),
        watermark,
        watermark_time: (watermark != 0).then(|| format_millis(watermark, offset)),
        weekly_flag,
        current_week: week_key(today),
        deep_scan_due,
        indexed: store.load_index()?.len(),
        queued,
        locked: cfg.resolve(&cfg.paths.lock_file).exists(),
    })
}

fn label(text: &str, color: bool) -> String {
    if color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

fn flag(on: bool, color: bool) -> String {
    match (on, color) {
        (true, true) => "yes".green().to_string(),
        (false, true) => "no".dimmed().to_string(),
        (true, false) => "yes".to_string(),
        (false, false) => "no".to_string(),
    }
}

/// Run the status command
pub fn run(cfg: &Config, out: Output) -> Result<()> {
    let status = read_status(cfg, Utc::now())?;

    if out.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let c = out.color;
    println!("{} {}", label("Data directory:", c), status.data_dir.display());
    println!(
        "{} {} ({})",
        label("Watermark:     ", c),
        status.watermark,
        status.watermark_time.as_deref().unwrap_or("never")
    );
    println!(
        "{} {} (current {})",
        label("Deep scan week:", c),
        status.weekly_flag.as_deref().unwrap_or("none"),
        status.current_week
    );
    println!("{} {}", label("Deep scan due: ", c), flag(status.deep_scan_due, c));
    println!("{} {}", label("Indexed:       ", c), status.indexed);
    println!("{} {}", label("Queued:        ", c), status.queued);
    println!("{} {}", label("Locked:        ", c), flag(status.locked, c));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_status_of_empty_data_dir() {
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        // Sunday 2025-02-16 in UTC+8
        let now = Utc.with_ymd_and_hms(2025, 2, 16, 4, 0, 0).unwrap();

        let status = read_status(&cfg, now).unwrap();

        assert_eq!(status.watermark, 0);
        assert!(status.watermark_time.is_none());
        assert_eq!(status.current_week, "2025-07");
        assert!(status.deep_scan_due);
        assert_eq!(status.indexed, 0);
        assert!(!status.locked);
    }

    #[test]
    fn test_status_counts_valid_queue_lines() {
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        fs::create_dir_all(dir.path().join("Queue")).unwrap();
        fs::write(dir.path().join("Queue/ReleaseQueue.txt"), "1|org.a|b\nbad\n2|org.c|d\n").unwrap();
        fs::write(dir.path().join("ApacheArtifact.flag"), "2025-07").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 2, 16, 4, 0, 0).unwrap();

        let status = read_status(&cfg, now).unwrap();

        assert_eq!(status.queued, 2);
        assert!(!status.deep_scan_due);
    }
}
