// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Persisted run state: watermark, weekly flag, index and release queue
//!
//! [`FileStateStore`] is the on-disk layout used by the binary;
//! [`MemoryStateStore`] keeps everything in memory for tests.

use crate::config::Config;
use crate::index::ArtifactIndex;
use crate::types::ReleaseQueueEntry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Access to the state shared between runs
pub trait StateStore {
    /// Last processed publish timestamp, 0 when unknown
    fn watermark(&self) -> Result<i64>;
    /// Persist a new watermark
    fn set_watermark(&mut self, ts: i64) -> Result<()>;
    /// Week key of the last successful deep scan
    fn weekly_flag(&self) -> Result<Option<String>>;
    /// Persist the week key of a successful deep scan
    fn set_weekly_flag(&mut self, week_key: &str) -> Result<()>;
    /// Load the artifact index, empty when unknown
    fn load_index(&self) -> Result<ArtifactIndex>;
    /// Persist the artifact index
    fn save_index(&mut self, index: &ArtifactIndex) -> Result<()>;
    /// Raw release queue contents, empty when unknown
    fn read_release_queue(&self) -> Result<String>;
    /// Append one entry to the release queue
    fn append_release(&mut self, entry: &ReleaseQueueEntry) -> Result<()>;
    /// Replace the release queue with `entries`
    fn replace_release_queue(&mut self, entries: &[ReleaseQueueEntry]) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WatermarkDocument {
    #[serde(default)]
    ts_update: i64,
}

/// Write `contents` to `path` through a temporary file in the same
/// directory, so readers never observe a truncated file
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Read a file that may legitimately not exist yet
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

fn render_release_queue(entries: &[ReleaseQueueEntry]) -> String {
    entries.iter().map(|e| e.to_line() + "\n").collect()
}

// =============================================================================
// File-backed store
// =============================================================================

/// State stored as plain files below the data directory
#[derive(Debug, Clone)]
pub struct FileStateStore {
    watermark_file: PathBuf,
    index_file: PathBuf,
    weekly_flag_file: PathBuf,
    release_queue_file: PathBuf,
}

impl FileStateStore {
    /// Store using the paths configured in `cfg`
    #[must_use]
    pub fn new(cfg: &Config) -> Self {
        Self {
            watermark_file: cfg.resolve(&cfg.paths.watermark_file),
            index_file: cfg.resolve(&cfg.paths.index_file),
            weekly_flag_file: cfg.resolve(&cfg.paths.weekly_flag_file),
            release_queue_file: cfg.resolve(&cfg.paths.release_queue_file),
        }
    }

    /// Read the index document as a JSON object, empty when absent or malformed
    fn read_index_document(&self) -> Result<Map<String, Value>> {
        let Some(content) = read_optional(&self.index_file)? else {
            return Ok(Map::new());
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(doc)) => Ok(doc),
            Ok(_) => {
                warn!(path = %self.index_file.display(), "Index document is not an object, ignoring");
                Ok(Map::new())
            }
            Err(e) => {
                warn!(path = %self.index_file.display(), error = %e, "Failed to parse index, ignoring");
                Ok(Map::new())
            }
        }
    }
}

impl StateStore for FileStateStore {
    fn watermark(&self) -> Result<i64> {
        let Some(content) = read_optional(&self.watermark_file)? else {
            return Ok(0);
        };
        match serde_json::from_str::<WatermarkDocument>(&content) {
            Ok(doc) => Ok(doc.ts_update),
            Err(e) => {
                warn!(path = %self.watermark_file.display(), error = %e, "Failed to parse watermark, using 0");
                Ok(0)
            }
        }
    }

    fn set_watermark(&mut self, ts: i64) -> Result<()> {
        let json = serde_json::to_string_pretty(&WatermarkDocument { ts_update: ts })
            .context("Failed to serialize watermark")?;
        write_atomic(&self.watermark_file, json.as_bytes())?;
        info!(path = %self.watermark_file.display(), ts, "Watermark updated");
        Ok(())
    }

    fn weekly_flag(&self) -> Result<Option<String>> {
        Ok(read_optional(&self.weekly_flag_file)?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    fn set_weekly_flag(&mut self, week_key: &str) -> Result<()> {
        write_atomic(&self.weekly_flag_file, week_key.as_bytes())?;
        info!(path = %self.weekly_flag_file.display(), week_key, "Weekly flag updated");
        Ok(())
    }

    fn load_index(&self) -> Result<ArtifactIndex> {
        Ok(ArtifactIndex::from_document(&self.read_index_document()?))
    }

    fn save_index(&mut self, index: &ArtifactIndex) -> Result<()> {
        let mut doc = self.read_index_document()?;
        // Union with what is on disk so the persisted list never shrinks
        let mut merged = ArtifactIndex::from_document(&doc);
        merged.merge(index);
        merged.write_into(&mut doc);

        let json = serde_json::to_string_pretty(&Value::Object(doc))
            .context("Failed to serialize index")?;
        write_atomic(&self.index_file, json.as_bytes())?;
        info!(path = %self.index_file.display(), entries = merged.len(), "Index updated");
        Ok(())
    }

    fn read_release_queue(&self) -> Result<String> {
        Ok(read_optional(&self.release_queue_file)?.unwrap_or_default())
    }

    fn append_release(&mut self, entry: &ReleaseQueueEntry) -> Result<()> {
        if let Some(dir) = self.release_queue_file.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.release_queue_file)
            .with_context(|| format!("Failed to open {}", self.release_queue_file.display()))?;
        writeln!(file, "{}", entry.to_line())
            .with_context(|| format!("Failed to append to {}", self.release_queue_file.display()))?;
        Ok(())
    }

    fn replace_release_queue(&mut self, entries: &[ReleaseQueueEntry]) -> Result<()> {
        write_atomic(&self.release_queue_file, render_release_queue(entries).as_bytes())?;
        debug!(path = %self.release_queue_file.display(), entries = entries.len(), "queue.rewrite");
        Ok(())
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// State kept in memory, with write counters for assertions
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    /// Current watermark, `None` until first written
    pub watermark: Option<i64>,
    /// Current weekly flag
    pub weekly_flag: Option<String>,
    /// Current index
    pub index: ArtifactIndex,
    /// Raw release queue text
    pub release_queue: String,
    /// Number of `set_watermark` calls
    pub watermark_writes: usize,
    /// Number of `save_index` calls
    pub index_writes: usize,
}

impl StateStore for MemoryStateStore {
    fn watermark(&self) -> Result<i64> {
        Ok(self.watermark.unwrap_or(0))
    }

    fn set_watermark(&mut self, ts: i64) -> Result<()> {
        self.watermark = Some(ts);
        self.watermark_writes += 1;
        Ok(())
    }

    fn weekly_flag(&self) -> Result<Option<String>> {
        Ok(self.weekly_flag.clone())
    }

    fn set_weekly_flag(&mut self, week_key: &str) -> Result<()> {
        self.weekly_flag = Some(week_key.to_string());
        Ok(())
    }

    fn load_index(&self) -> Result<ArtifactIndex> {
        Ok(self.index.clone())
    }

    fn save_index(&mut self, index: &ArtifactIndex) -> Result<()> {
        self.index.merge(index);
        self.index_writes += 1;
        Ok(())
    }

    fn read_release_queue(&self) -> Result<String> {
        Ok(self.release_queue.clone())
    }

    fn append_release(&mut self, entry: &ReleaseQueueEntry) -> Result<()> {
        self.release_queue.push_str(&entry.to_line());
        self.release_queue.push('\n');
        Ok(())
    }

    fn replace_release_queue(&mut self, entries: &[ReleaseQueueEntry]) -> Result<()> {
        self.release_queue = render_release_queue(entries);
        Ok(())
    }
}

// =============================================================================
// Run lock
// =============================================================================

/// Exclusive marker file held for the duration of a run
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock, or return `None` if another run holds it.
    ///
    /// A lock file older than `stale_after` is removed and taken over.
    pub fn acquire(path: &Path, stale_after: Duration) -> Result<Option<Self>> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    debug!(path = %path.display(), "lock.acquired");
                    return Ok(Some(Self { path: path.to_path_buf() }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let age = fs::metadata(path)
                        .and_then(|m| m.modified())
                        .ok()
                        .and_then(|t| t.elapsed().ok())
                        .unwrap_or_default();
                    if age < stale_after {
                        return Ok(None);
                    }
                    warn!(path = %path.display(), age_secs = age.as_secs(), "Removing stale lock");
                    match fs::remove_file(path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => {
                            return Err(e).with_context(|| format!("Failed to remove {}", path.display()))
                        }
                    }
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()));
                }
            }
        }
        Ok(None)
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactKey;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileStateStore {
        let cfg = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        FileStateStore::new(&cfg)
    }

    #[test]
    fn test_missing_files_read_as_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.watermark().unwrap(), 0);
        assert_eq!(store.weekly_flag().unwrap(), None);
        assert!(store.load_index().unwrap().is_empty());
        assert_eq!(store.read_release_queue().unwrap(), "");
    }

    #[test]
    fn test_malformed_state_reads_as_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let artifact = dir.path().join("Maven/Artifact");
        let version = dir.path().join("Maven/Version");
        fs::create_dir_all(&artifact).unwrap();
        fs::create_dir_all(&version).unwrap();
        fs::write(artifact.join("_index.json"), "{not json").unwrap();
        fs::write(version.join("_index.json"), "[1, 2]").unwrap();

        assert_eq!(store.watermark().unwrap(), 0);
        assert!(store.load_index().unwrap().is_empty());
    }

    #[test]
    fn test_watermark_and_flag_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        store.set_watermark(1_700_000_000_123).unwrap();
        store.set_weekly_flag("2025-07").unwrap();

        assert_eq!(store.watermark().unwrap(), 1_700_000_000_123);
        assert_eq!(store.weekly_flag().unwrap().as_deref(), Some("2025-07"));
        let raw = fs::read_to_string(dir.path().join("Maven/Artifact/_index.json")).unwrap();
        assert!(raw.contains("\"ts_update\": 1700000000123"));
    }

    #[test]
    fn test_save_index_preserves_fields_and_never_shrinks() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let index_path = dir.path().join("Maven/Version/_index.json");
        fs::create_dir_all(index_path.parent().unwrap()).unwrap();
        fs::write(&index_path, r#"{"list": ["org.old:one"], "note": "keep"}"#).unwrap();

        let mut fresh = ArtifactIndex::new();
        fresh.insert(&ArtifactKey::parse("org.new:two").unwrap());
        store.save_index(&fresh).unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&index_path).unwrap()).unwrap();
        assert_eq!(doc["note"], "keep");
        assert_eq!(doc["list"], serde_json::json!(["org.new:two", "org.old:one"]));
    }

    #[test]
    fn test_release_queue_append_and_replace() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let entry = ReleaseQueueEntry::parse_line("1000|org.a|b").unwrap();

        store.append_release(&entry).unwrap();
        store.append_release(&entry).unwrap();
        assert_eq!(store.read_release_queue().unwrap(), "1000|org.a|b\n1000|org.a|b\n");

        store.replace_release_queue(&[entry]).unwrap();
        assert_eq!(store.read_release_queue().unwrap(), "1000|org.a|b\n");
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/file.txt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_run_lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".lock");

        let held = RunLock::acquire(&path, Duration::from_secs(3600)).unwrap();
        assert!(held.is_some());
        assert!(RunLock::acquire(&path, Duration::from_secs(3600)).unwrap().is_none());

        drop(held);
        assert!(!path.exists());
        assert!(RunLock::acquire(&path, Duration::from_secs(3600)).unwrap().is_some());
    }

    #[test]
    fn test_stale_run_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".lock");
        fs::write(&path, "12345\n").unwrap();

        let lock = RunLock::acquire(&path, Duration::ZERO).unwrap();
        assert!(lock.is_some());
    }
}
