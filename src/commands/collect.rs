// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Collect command - one scheduled run against Maven Central

use super::Output;
use crate::client::CentralClient;
use crate::collect::{CollectSettings, Collector, PassSummary, RunReport};
use crate::config::Config;
use crate::persist::ArtifactWriter;
use crate::schedule::RunMode;
use crate::store::{FileStateStore, RunLock};
use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;
use tracing::warn;

/// Run the collect command; `force` bypasses the weekly gate
pub fn run(cfg: &Config, force: Option<RunMode>, out: Output) -> Result<()> {
    let lock_path = cfg.resolve(&cfg.paths.lock_file);
    let Some(_lock) = RunLock::acquire(&lock_path, Duration::from_secs(cfg.queue.lock_stale_mins * 60))? else {
        warn!(path = %lock_path.display(), "Another run holds the lock, nothing done");
        return Ok(());
    };

    let settings = CollectSettings::from_config(cfg)?;
    let client = CentralClient::new(&cfg.api).context("Failed to build HTTP client")?;
    let writer = ArtifactWriter::new(cfg)?;
    let mut store = FileStateStore::new(cfg);

    let report = Collector::new(&client, &writer, &mut store, &settings).run(Utc::now(), force)?;
    let feed = super::feed::publish(cfg, &report.compaction.entries)?;

    if out.json {
        println!("{}", report_json(&report, feed.items.len()));
    } else {
        print_report(&report, feed.items.len());
    }
    Ok(())
}

fn pass_json(pass: &PassSummary) -> serde_json::Value {
    serde_json::json!({
        "pages": pass.pages,
        "processed": pass.processed,
        "skipped": pass.skipped,
        "new": pass.new_identities,
        "halt": format!("{:?}", pass.halt),
        "fetch_error": pass.fetch_error,
        "watermark": pass.watermark,
    })
}

fn report_json(report: &RunReport, feed_items: usize) -> serde_json::Value {
    serde_json::json!({
        "mode": format!("{:?}", report.planned),
        "deep_scan": report.deep_scan.as_ref().map(pass_json),
        "incremental": report.incremental.as_ref().map(pass_json),
        "week_key_written": report.week_key_written,
        "queue": report.compaction.entries.len(),
        "feed_items": feed_items,
    })
}

fn print_pass(label: &str, pass: &PassSummary) {
    println!(
        "{label}: {} processed ({} new, {} skipped) over {} pages, stopped: {:?}",
        pass.processed, pass.new_identities, pass.skipped, pass.pages, pass.halt
    );
    if let Some(err) = &pass.fetch_error {
        println!("  fetch error: {err}");
    }
}

fn print_report(report: &RunReport, feed_items: usize) {
    if let Some(pass) = &report.deep_scan {
        print_pass("Deep scan", pass);
    }
    if let Some(pass) = &report.incremental {
        print_pass("Incremental", pass);
    }
    if let Some(week) = &report.week_key_written {
        println!("Deep scan recorded for week {week}");
    }
    println!(
        "Release queue: {} entries, feed: {} items",
        report.compaction.entries.len(),
        feed_items
    );
}
