// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Compact command - rewrite the release queue

use super::Output;
use crate::config::Config;
use crate::queue::compact_store;
use crate::store::{FileStateStore, RunLock};
use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tracing::warn;

/// Run the compact command; `expiry_mins` overrides the configured window
pub fn run(cfg: &Config, expiry_mins: Option<u64>, out: Output) -> Result<()> {
    let lock_path = cfg.resolve(&cfg.paths.lock_file);
    let Some(_lock) = RunLock::acquire(&lock_path, Duration::from_secs(cfg.queue.lock_stale_mins * 60))? else {
        warn!(path = %lock_path.display(), "Another run holds the lock, nothing done");
        return Ok(());
    };

    let expiry = Duration::from_secs(expiry_mins.unwrap_or(cfg.queue.expiry_mins) * 60);
    let mut store = FileStateStore::new(cfg);
    let result = compact_store(&mut store, Utc::now().timestamp_millis(), expiry)?;

    if out.json {
        println!(
            "{}",
            serde_json::json!({
                "kept": result.entries.len(),
                "expired": result.expired,
                "superseded": result.superseded,
                "malformed": result.malformed,
            })
        );
    } else {
        println!(
            "Release queue: {} kept, {} expired, {} superseded, {} malformed",
            result.entries.len(),
            result.expired,
            result.superseded,
            result.malformed
        );
    }
    Ok(())
}
