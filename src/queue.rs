// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Release queue compaction
//!
//! The queue is an append-only log of `ts|group|artifact` lines. Compaction
//! drops malformed and expired lines and keeps one line per identity with
//! the latest publish time, ordered oldest first.

use crate::store::StateStore;
use crate::types::{ArtifactKey, ReleaseQueueEntry};
use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Outcome of one compaction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compaction {
    /// Surviving entries, ascending by publish time
    pub entries: Vec<ReleaseQueueEntry>,
    /// Lines that could not be parsed
    pub malformed: usize,
    /// Lines older than the expiry window
    pub expired: usize,
    /// Lines replaced by a newer line for the same identity
    pub superseded: usize,
}

impl Compaction {
    /// Queue text for the surviving entries
    #[must_use]
    pub fn to_text(&self) -> String {
        self.entries.iter().map(|e| e.to_line() + "\n").collect()
    }
}

/// Compact raw queue text against `now_ms` and the expiry window
#[must_use]
pub fn compact(raw: &str, now_ms: i64, expiry: Duration) -> Compaction {
    let expiry_ms = i64::try_from(expiry.as_millis()).unwrap_or(i64::MAX);
    let cutoff = now_ms.saturating_sub(expiry_ms);

    let mut result = Compaction::default();
    let mut latest: HashMap<ArtifactKey, i64> = HashMap::new();
    let mut kept = 0usize;

    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let Some(entry) = ReleaseQueueEntry::parse_line(line) else {
            result.malformed += 1;
            continue;
        };
        if entry.ts_publish < cutoff {
            result.expired += 1;
            continue;
        }
        kept += 1;
        latest
            .entry(entry.key)
            .and_modify(|ts| *ts = (*ts).max(entry.ts_publish))
            .or_insert(entry.ts_publish);
    }

    result.superseded = kept - latest.len();
    result.entries = latest
        .into_iter()
        .map(|(key, ts_publish)| ReleaseQueueEntry { ts_publish, key })
        .collect();
    result
        .entries
        .sort_by(|a, b| a.ts_publish.cmp(&b.ts_publish).then_with(|| a.key.cmp(&b.key)));
    result
}

/// Compact the stored queue and write the result back
pub fn compact_store(store: &mut dyn StateStore, now_ms: i64, expiry: Duration) -> Result<Compaction> {
    let raw = store.read_release_queue()?;
    let compaction = compact(&raw, now_ms, expiry);
    store.replace_release_queue(&compaction.entries)?;
    info!(
        kept = compaction.entries.len(),
        expired = compaction.expired,
        superseded = compaction.superseded,
        malformed = compaction.malformed,
        "Release queue compacted"
    );
    Ok(compaction)
}
