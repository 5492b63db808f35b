// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Feed command - regenerate the JSON Feed from the release queue

use super::Output;
use crate::config::Config;
use crate::feed::{build_feed, write_feed, JsonFeed};
use crate::persist::ArtifactWriter;
use crate::queue::compact;
use crate::store::{FileStateStore, StateStore};
use crate::types::ReleaseQueueEntry;
use anyhow::Result;
use chrono::Utc;
use std::time::Duration;

/// Build and write the feed for compacted queue entries (oldest first)
pub fn publish(cfg: &Config, compacted: &[ReleaseQueueEntry]) -> Result<JsonFeed> {
    let newest_first: Vec<ReleaseQueueEntry> = compacted.iter().rev().cloned().collect();
    let writer = ArtifactWriter::new(cfg)?;
    let feed = build_feed(&newest_first, &writer, &cfg.feed)?;
    write_feed(&cfg.resolve(&cfg.paths.feed_file), &feed)?;
    Ok(feed)
}

/// Run the feed command.
///
/// The queue is compacted in memory only; the file is left as is.
pub fn run(cfg: &Config, out: Output) -> Result<()> {
    let store = FileStateStore::new(cfg);
    let expiry = Duration::from_secs(cfg.queue.expiry_mins * 60);
    let compaction = compact(&store.read_release_queue()?, Utc::now().timestamp_millis(), expiry);
    let feed = publish(cfg, &compaction.entries)?;
    let path = cfg.resolve(&cfg.paths.feed_file);

    if out.json {
        println!(
            "{}",
            serde_json::json!({
                "path": path,
                "queued": compaction.entries.len(),
                "items": feed.items.len(),
            })
        );
    } else {
        println!(
            "Feed written to {} ({} items, {} queued)",
            path.display(),
            feed.items.len(),
            compaction.entries.len()
        );
    }
    Ok(())
}
