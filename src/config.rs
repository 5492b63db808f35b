// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Every value has a default, so an absent config file is fine. Values are
//! layered: defaults, then the TOML file, then `MAVENFEED__SECTION__KEY`
//! environment variables, then command-line overrides.

use anyhow::{Context, Result};
use chrono::{FixedOffset, Weekday};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment prefix for layered overrides
pub const ENV_PREFIX: &str = "MAVENFEED";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory all state and output paths are relative to
    pub data_dir: PathBuf,
    /// Remote API settings
    pub api: ApiConfig,
    /// Collection behaviour
    pub collect: CollectConfig,
    /// File layout below `data_dir`
    pub paths: PathsConfig,
    /// Release queue settings
    pub queue: QueueConfig,
    /// JSON Feed metadata
    pub feed: FeedConfig,
}

/// Sonatype Central browse API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Browse endpoint receiving the paged POST
    pub endpoint: String,
    /// Records per page
    pub page_size: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent header
    pub user_agent: String,
    /// Retry policy for transient failures
    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://central.sonatype.com/api/internal/browse/components".to_string(),
            page_size: 20,
            timeout_secs: 30,
            user_agent: concat!("mavenfeed/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay in milliseconds before first retry
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after every retry
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay_ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}

/// Collection behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// Weekday on which the deep scan runs (e.g. "sun")
    pub deep_scan_day: String,
    /// Search term used by the deep scan
    pub deep_scan_search_term: String,
    /// Deep scan starts at this page and walks down to 0
    pub deep_scan_start_page: u32,
    /// Upper bound on pages visited by one incremental run
    pub max_incremental_pages: u32,
    /// Offset (hours east of UTC) for human timestamps and "today"
    pub utc_offset_hours: i32,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            deep_scan_day: "sun".to_string(),
            deep_scan_search_term: "org.apache.".to_string(),
            deep_scan_start_page: 300,
            max_incremental_pages: 500,
            utc_offset_hours: 8,
        }
    }
}

impl CollectConfig {
    /// Parsed deep scan weekday
    pub fn deep_scan_weekday(&self) -> Result<Weekday> {
        self.deep_scan_day
            .parse::<Weekday>()
            .map_err(|_| anyhow::anyhow!("Invalid collect.deep_scan_day: {}", self.deep_scan_day))
    }

    /// Display and scheduling offset
    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow::anyhow!("Invalid collect.utc_offset_hours: {}", self.utc_offset_hours))
    }
}

/// File layout, relative to the data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Watermark document
    pub watermark_file: PathBuf,
    /// Artifact index document
    pub index_file: PathBuf,
    /// Root of per-artifact metadata documents
    pub artifact_dir: PathBuf,
    /// Root of per-artifact badges
    pub badge_dir: PathBuf,
    /// Weekly deep scan flag
    pub weekly_flag_file: PathBuf,
    /// Pipe-delimited release log
    pub release_queue_file: PathBuf,
    /// Generated JSON Feed
    pub feed_file: PathBuf,
    /// Single-flight lock
    pub lock_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            watermark_file: PathBuf::from("Maven/Artifact/_index.json"),
            index_file: PathBuf::from("Maven/Version/_index.json"),
            artifact_dir: PathBuf::from("Maven/Artifact"),
            badge_dir: PathBuf::from("Badge"),
            weekly_flag_file: PathBuf::from("ApacheArtifact.flag"),
            release_queue_file: PathBuf::from("Queue/ReleaseQueue.txt"),
            feed_file: PathBuf::from("Feed/ReleaseQueue.json"),
            lock_file: PathBuf::from(".mavenfeed.lock"),
        }
    }
}

/// Release queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Entries older than this are dropped on compaction
    pub expiry_mins: u64,
    /// A lock file older than this is considered abandoned
    pub lock_stale_mins: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            expiry_mins: 120,
            lock_stale_mins: 120,
        }
    }
}

/// JSON Feed metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed title
    pub title: String,
    /// Feed description
    pub description: String,
    /// Site the feed belongs to, also used as every item's url
    pub home_page_url: String,
    /// Public URL of the feed document
    pub feed_url: String,
    /// Public base URL under which badges are served
    pub badge_base_url: String,
    /// Feed icon
    pub icon: String,
    /// Feed favicon
    pub favicon: String,
    /// Feed author name
    pub author_name: String,
    /// Author attached to every item
    pub item_author: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let home = "https://raw.githubusercontent.com/ACANX/MavenArtifact/refs/heads/latest/";
        Self {
            title: "Maven Central release queue".to_string(),
            description: "Recently published Maven Central artifacts".to_string(),
            home_page_url: home.to_string(),
            feed_url: format!("{home}Feed/ReleaseQueue.json"),
            badge_base_url: format!("{home}Badge/"),
            icon: "https://unavatar.webp.se/central.sonatype.com?fallback=true".to_string(),
            favicon: "https://unavatar.webp.se/central.sonatype.com?fallback=true".to_string(),
            author_name: "Maven Central release queue".to_string(),
            item_author: "MvnArtifactReleaseQueue".to_string(),
        }
    }
}

impl Config {
    /// Resolve a configured relative path against the data directory
    #[must_use]
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.data_dir.join(relative)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        self.collect.deep_scan_weekday()?;
        self.collect.offset()?;
        if self.api.page_size == 0 {
            anyhow::bail!("api.page_size must be greater than zero");
        }
        if self.collect.max_incremental_pages == 0 {
            anyhow::bail!("collect.max_incremental_pages must be greater than zero");
        }
        Ok(())
    }
}

/// Default config file location
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "hyperpolymath", "mavenfeed")
        .map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration from disk and environment, falling back to defaults
pub fn load(path: Option<&Path>, data_dir: Option<&Path>) -> Result<Config> {
    let mut builder = config::Config::builder();

    let file = path.map(Path::to_path_buf).or_else(default_config_path);
    if let Some(file) = file {
        tracing::debug!(path = %file.display(), exists = file.exists(), "config.load");
        // An explicitly named file must exist
        builder = builder.add_source(config::File::from(file).required(path.is_some()));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let mut cfg: Config = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    if let Some(dir) = data_dir {
        cfg.data_dir = dir.to_path_buf();
    }
    if cfg.data_dir.as_os_str().is_empty() {
        cfg.data_dir = PathBuf::from(".");
    }

    cfg.validate()?;
    Ok(cfg)
}
