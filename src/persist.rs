// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Per-artifact output: one metadata document and one badge per identity

use crate::badge::render_badge;
use crate::config::Config;
use crate::store::{read_optional, write_atomic};
use crate::types::{ArtifactDocument, ArtifactKey, ArtifactRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result of persisting one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Both files were (re)written
    Written {
        /// Metadata document path
        document: PathBuf,
        /// Badge path
        badge: PathBuf,
    },
    /// Record had no usable identity, nothing written
    Skipped,
}

/// Destination for collected records
pub trait ArtifactSink {
    /// Persist one record; writes overwrite any earlier output for the identity
    fn persist(&self, record: &ArtifactRecord, now: DateTime<Utc>) -> Result<PersistOutcome>;
}

/// Writes documents and badges below two root directories
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    artifact_dir: PathBuf,
    badge_dir: PathBuf,
    offset: FixedOffset,
}

impl ArtifactWriter {
    /// Writer using the configured layout
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self::with_dirs(
            cfg.resolve(&cfg.paths.artifact_dir),
            cfg.resolve(&cfg.paths.badge_dir),
            cfg.collect.offset()?,
        ))
    }

    /// Writer with explicit roots
    #[must_use]
    pub fn with_dirs(artifact_dir: PathBuf, badge_dir: PathBuf, offset: FixedOffset) -> Self {
        Self { artifact_dir, badge_dir, offset }
    }

    /// `<artifact_dir>/<group path>/<artifact_id>.json`
    #[must_use]
    pub fn document_path(&self, key: &ArtifactKey) -> PathBuf {
        output_path(&self.artifact_dir, key, "json")
    }

    /// `<badge_dir>/<group path>/<artifact_id>.svg`
    #[must_use]
    pub fn badge_path(&self, key: &ArtifactKey) -> PathBuf {
        output_path(&self.badge_dir, key, "svg")
    }

    /// Read back a metadata document.
    ///
    /// Missing and malformed documents both yield `None`.
    pub fn read_document(&self, key: &ArtifactKey) -> Result<Option<ArtifactDocument>> {
        let path = self.document_path(key);
        let Some(content) = read_optional(&path)? else {
            return Ok(None);
        };
        match serde_json::from_str(&content) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse artifact document");
                Ok(None)
            }
        }
    }
}

impl ArtifactSink for ArtifactWriter {
    fn persist(&self, record: &ArtifactRecord, now: DateTime<Utc>) -> Result<PersistOutcome> {
        let Some(key) = record.key() else {
            warn!(
                group_id = %record.group_id,
                artifact_id = %record.artifact_id,
                "Skipping artifact without a usable group or artifact id"
            );
            return Ok(PersistOutcome::Skipped);
        };

        let badge = self.badge_path(&key);
        write_atomic(&badge, render_badge(record).as_bytes())?;

        let document = self.document_path(&key);
        let doc = ArtifactDocument::from_record(record, now, self.offset);
        let json = serde_json::to_string_pretty(&doc)
            .with_context(|| format!("Failed to serialize document for {key}"))?;
        write_atomic(&document, json.as_bytes())?;

        debug!(%key, document = %document.display(), badge = %badge.display(), "artifact.persisted");
        Ok(PersistOutcome::Written { document, badge })
    }
}

fn output_path(root: &Path, key: &ArtifactKey, extension: &str) -> PathBuf {
    root.join(key.group_path())
        .join(format!("{}.{extension}", key.artifact_id))
}
