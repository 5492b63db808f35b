// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Mavenfeed library - incremental Maven Central collector
//!
//! This crate polls the Sonatype Central browse API, persists one metadata
//! document and one SVG badge per artifact, keeps a running index and a
//! publish-time watermark, and assembles a JSON Feed from a rolling
//! release queue.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod badge;
pub mod client;
pub mod collect;
pub mod commands;
pub mod config;
pub mod feed;
pub mod index;
pub mod persist;
pub mod queue;
pub mod schedule;
pub mod store;

/// Core data types shared by the collector, the persister and the feed
pub mod types {
    use chrono::{DateTime, FixedOffset, Utc};
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::path::PathBuf;

    /// Publish timestamp assumed for components the API returns without one
    pub const MISSING_TIMESTAMP_LAG_MS: i64 = 300 * 1000;

    /// Schema version written into every artifact document
    pub const DOCUMENT_SCHEMA_VERSION: u32 = 1;

    // =========================================================================
    // Identity
    // =========================================================================

    /// Identity of an artifact: `group_id:artifact_id`
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ArtifactKey {
        /// Maven group id (e.g. `org.apache.commons`)
        pub group_id: String,
        /// Maven artifact id (e.g. `commons-lang3`)
        pub artifact_id: String,
    }

    impl ArtifactKey {
        /// Build a key, rejecting parts that are empty or unsafe as paths
        #[must_use]
        pub fn new(group_id: &str, artifact_id: &str) -> Option<Self> {
            if !group_id.split('.').all(is_safe_path_component) || !is_safe_path_component(artifact_id) {
                return None;
            }
            Some(Self {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
            })
        }

        /// Parse the colon-joined index form
        #[must_use]
        pub fn parse(s: &str) -> Option<Self> {
            let (group_id, artifact_id) = s.split_once(':')?;
            Self::new(group_id, artifact_id)
        }

        /// Relative directory for this group: dots become path separators
        #[must_use]
        pub fn group_path(&self) -> PathBuf {
            self.group_id.split('.').collect()
        }

        /// Group path with forward slashes, for URLs
        #[must_use]
        pub fn group_url_path(&self) -> String {
            self.group_id.replace('.', "/")
        }
    }

    /// Whether `part` can be used as a single file or directory name.
    ///
    /// Group ids are checked one dot-separated segment at a time.
    #[must_use]
    pub fn is_safe_path_component(part: &str) -> bool {
        !part.is_empty()
            && part != "."
            && part != ".."
            && !part.contains(['/', '\\', ':', '\0'])
    }

    impl fmt::Display for ArtifactKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}", self.group_id, self.artifact_id)
        }
    }

    // =========================================================================
    // Raw API shapes
    // =========================================================================

    /// Version block nested inside a browse component
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LatestVersionInfo {
        /// Latest published version
        pub version: Option<String>,
        /// Publish time in epoch milliseconds
        #[serde(rename = "timestampUnixWithMS")]
        pub timestamp_unix_with_ms: Option<i64>,
        /// License names
        pub licenses: Option<Vec<String>>,
    }

    /// One entry of the `components` array returned by the browse API
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawComponent {
        /// Registry id of the component
        pub id: Option<String>,
        /// Maven group id
        pub namespace: Option<String>,
        /// Maven artifact id
        pub name: Option<String>,
        /// Free text description
        pub description: Option<String>,
        /// Latest version details
        pub latest_version_info: Option<LatestVersionInfo>,
        /// Number of artifacts this one depends on
        pub dependent_on_count: Option<u64>,
        /// Number of artifacts depending on this one
        pub dependency_of_count: Option<u64>,
        /// Registry categories
        pub categories: Option<Vec<String>>,
    }

    // =========================================================================
    // Artifact record
    // =========================================================================

    /// A parsed artifact, built fresh from every fetched component
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ArtifactRecord {
        /// Registry id, empty when the API omits it
        pub id: String,
        /// Maven group id, may be empty for invalid components
        pub group_id: String,
        /// Maven artifact id, may be empty for invalid components
        pub artifact_id: String,
        /// Latest version or `N/A`
        pub latest_version: String,
        /// Publish time in epoch milliseconds
        pub ts_publish: i64,
        /// Description, empty when absent
        pub description: String,
        /// License names
        pub licenses: Vec<String>,
        /// Dependency count
        pub dep_count: u64,
        /// Dependent count
        pub ref_count: u64,
        /// Registry categories
        pub categories: Vec<String>,
    }

    impl ArtifactRecord {
        /// Parse a raw component, filling documented defaults.
        ///
        /// `now_ms` is only used when the component has no publish time.
        #[must_use]
        pub fn from_component(component: &RawComponent, now_ms: i64) -> Self {
            let info = component.latest_version_info.clone().unwrap_or_default();
            Self {
                id: component.id.clone().unwrap_or_default(),
                group_id: component.namespace.clone().unwrap_or_default(),
                artifact_id: component.name.clone().unwrap_or_default(),
                latest_version: info.version.unwrap_or_else(|| "N/A".to_string()),
                ts_publish: info
                    .timestamp_unix_with_ms
                    .unwrap_or(now_ms - MISSING_TIMESTAMP_LAG_MS),
                description: component.description.clone().unwrap_or_default(),
                licenses: info.licenses.unwrap_or_default(),
                dep_count: component.dependent_on_count.unwrap_or(0),
                ref_count: component.dependency_of_count.unwrap_or(0),
                categories: component.categories.clone().unwrap_or_default(),
            }
        }

        /// Identity of this record, `None` when either part is missing or unsafe
        #[must_use]
        pub fn key(&self) -> Option<ArtifactKey> {
            ArtifactKey::new(&self.group_id, &self.artifact_id)
        }
    }

    // =========================================================================
    // Persisted artifact document
    // =========================================================================

    /// Per-artifact metadata document as stored on disk
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ArtifactDocument {
        /// Registry id
        pub id: String,
        /// Description
        pub description: String,
        /// Maven group id
        pub group_id: String,
        /// Maven artifact id
        pub artifact_id: String,
        /// Latest version
        pub version_latest: String,
        /// Publish time in epoch milliseconds
        pub ts_publish: i64,
        /// Publish time, human readable in the display offset
        pub dt_publish: String,
        /// Time this document was written, epoch milliseconds
        pub ts_update: i64,
        /// Write time, human readable in the display offset
        pub dt_update: String,
        /// Dependency count
        pub count_dep: u64,
        /// Dependent count
        pub count_ref: u64,
        /// License names
        pub licenses: Vec<String>,
        /// Registry categories
        pub categories: Vec<String>,
        /// Extra feed tags, never written by the collector
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub tags: Vec<String>,
        /// Extra feed authors, never written by the collector
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub contributors: Vec<String>,
        /// Document schema version
        pub dsv: u32,
    }

    impl ArtifactDocument {
        /// Build the document for a record written at `now`
        #[must_use]
        pub fn from_record(record: &ArtifactRecord, now: DateTime<Utc>, offset: FixedOffset) -> Self {
            let now_ms = now.timestamp_millis();
            Self {
                id: record.id.clone(),
                description: record.description.clone(),
                group_id: record.group_id.clone(),
                artifact_id: record.artifact_id.clone(),
                version_latest: record.latest_version.clone(),
                ts_publish: record.ts_publish,
                dt_publish: format_millis(record.ts_publish, offset),
                ts_update: now_ms,
                dt_update: format_millis(now_ms, offset),
                count_dep: record.dep_count,
                count_ref: record.ref_count,
                licenses: record.licenses.clone(),
                categories: record.categories.clone(),
                tags: Vec::new(),
                contributors: Vec::new(),
                dsv: DOCUMENT_SCHEMA_VERSION,
            }
        }
    }

    // =========================================================================
    // Release queue
    // =========================================================================

    /// One line of the release queue: `ts_publish|group_id|artifact_id`
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ReleaseQueueEntry {
        /// Publish time in epoch milliseconds
        pub ts_publish: i64,
        /// Artifact identity
        pub key: ArtifactKey,
    }

    impl ReleaseQueueEntry {
        /// Parse one log line, `None` for anything malformed
        #[must_use]
        pub fn parse_line(line: &str) -> Option<Self> {
            let mut parts = line.trim().split('|');
            let ts_publish = parts.next()?.trim().parse().ok()?;
            let group_id = parts.next()?.trim();
            let artifact_id = parts.next()?.trim();
            if parts.next().is_some() {
                return None;
            }
            Some(Self {
                ts_publish,
                key: ArtifactKey::new(group_id, artifact_id)?,
            })
        }

        /// Render as a log line without the trailing newline
        #[must_use]
        pub fn to_line(&self) -> String {
            format!("{}|{}|{}", self.ts_publish, self.key.group_id, self.key.artifact_id)
        }
    }

    // =========================================================================
    // Time formatting
    // =========================================================================

    /// Format epoch millis as `YYYY-MM-DD HH:MM:SS.mmm` in `offset`
    #[must_use]
    pub fn format_millis(ms: i64, offset: FixedOffset) -> String {
        DateTime::<Utc>::from_timestamp_millis(ms)
            .unwrap_or_default()
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string()
    }

    /// Format epoch millis as an RFC 3339 UTC second-precision timestamp
    #[must_use]
    pub fn format_rfc3339_millis(ms: i64) -> String {
        DateTime::<Utc>::from_timestamp_millis(ms)
            .unwrap_or_default()
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    }

}

/// Prelude for common imports
pub mod prelude {
    pub use crate::types::*;
    pub use anyhow::{Context, Result};
}
