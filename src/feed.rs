// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! JSON Feed 1.1 built from the release queue

use crate::badge::escape_xml;
use crate::config::FeedConfig;
use crate::persist::ArtifactWriter;
use crate::store::write_atomic;
use crate::types::{format_rfc3339_millis, ArtifactDocument, ReleaseQueueEntry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// JSON Feed version URL
pub const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";

/// Tags used when a document carries none
pub const DEFAULT_TAGS: [&str; 3] = ["Artifact", "Maven", "Java"];

/// Top-level JSON Feed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonFeed {
    /// Format version URL
    pub version: String,
    /// Feed title
    pub title: String,
    /// Site the feed belongs to
    pub home_page_url: String,
    /// Public URL of this document
    pub feed_url: String,
    /// Feed description
    pub description: String,
    /// Feed icon
    pub icon: String,
    /// Feed favicon
    pub favicon: String,
    /// Feed authors
    pub authors: Vec<FeedAuthor>,
    /// Items, newest first
    pub items: Vec<FeedItem>,
}

/// Feed or item author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedAuthor {
    /// Display name
    pub name: String,
}

/// Linked resource attached to an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedAttachment {
    /// Resource URL
    pub url: String,
    /// MIME type
    pub mime_type: String,
    /// Size in bytes, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<u64>,
}

/// One released artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// `<id>@<version>`
    pub id: String,
    /// Item link
    pub url: String,
    /// Headline
    pub title: String,
    /// Badge image markup
    pub content_html: String,
    /// Plain text body
    pub content_text: String,
    /// Short summary
    pub summary: String,
    /// Publish time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    /// Last document update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    /// Item authors
    pub authors: Vec<FeedAuthor>,
    /// Item tags
    pub tags: Vec<String>,
    /// Badge attachment
    pub attachments: Vec<FeedAttachment>,
}

fn rfc3339_or_none(ms: i64) -> Option<String> {
    (ms != 0).then(|| format_rfc3339_millis(ms))
}

/// Build one item from a stored document.
///
/// `badge_size` is the on-disk size of the badge, if it exists.
#[must_use]
pub fn build_item(doc: &ArtifactDocument, cfg: &FeedConfig, badge_size: Option<u64>) -> FeedItem {
    let key = format!("{}:{}", doc.group_id, doc.artifact_id);
    let id = if doc.id.is_empty() { key.clone() } else { doc.id.clone() };

    let mut title = format!("{key} {} released", doc.version_latest);
    if !doc.description.trim().is_empty() {
        title.push_str(", ");
        title.push_str(doc.description.trim());
    }

    let badge_url = format!(
        "{}{}/{}.svg",
        cfg.badge_base_url,
        doc.group_id.replace('.', "/"),
        doc.artifact_id
    );

    let mut authors = vec![FeedAuthor {
        name: cfg.item_author.clone(),
    }];
    authors.extend(doc.contributors.iter().map(|name| FeedAuthor { name: name.clone() }));

    let tags = if doc.tags.is_empty() {
        DEFAULT_TAGS.iter().map(|t| (*t).to_string()).collect()
    } else {
        doc.tags.clone()
    };

    FeedItem {
        id: format!("{id}@{}", doc.version_latest),
        url: cfg.home_page_url.clone(),
        content_html: format!(
            r#"<img src="{}" alt="{}"/>"#,
            escape_xml(&badge_url),
            escape_xml(&title)
        ),
        content_text: title.clone(),
        summary: title.clone(),
        title,
        date_published: rfc3339_or_none(doc.ts_publish),
        date_modified: rfc3339_or_none(doc.ts_update),
        authors,
        tags,
        attachments: vec![FeedAttachment {
            url: badge_url,
            mime_type: "image/svg+xml".to_string(),
            size_in_bytes: badge_size,
        }],
    }
}

/// Build the feed for `entries`, given in the order items should appear.
///
/// Entries without a readable document are omitted.
pub fn build_feed(entries: &[ReleaseQueueEntry], writer: &ArtifactWriter, cfg: &FeedConfig) -> Result<JsonFeed> {
    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(doc) = writer.read_document(&entry.key)? else {
            warn!(key = %entry.key, "No artifact document, omitting from feed");
            continue;
        };
        let badge_size = fs::metadata(writer.badge_path(&entry.key)).ok().map(|m| m.len());
        items.push(build_item(&doc, cfg, badge_size));
    }
    debug!(requested = entries.len(), items = items.len(), "feed.built");

    Ok(JsonFeed {
        version: JSON_FEED_VERSION.to_string(),
        title: cfg.title.clone(),
        home_page_url: cfg.home_page_url.clone(),
        feed_url: cfg.feed_url.clone(),
        description: cfg.description.clone(),
        icon: cfg.icon.clone(),
        favicon: cfg.favicon.clone(),
        authors: vec![FeedAuthor {
            name: cfg.author_name.clone(),
        }],
        items,
    })
}

/// Serialize and atomically write `feed` to `path`
pub fn write_feed(path: &Path, feed: &JsonFeed) -> Result<()> {
    let json = serde_json::to_string_pretty(feed).context("Failed to serialize feed")?;
    write_atomic(path, json.as_bytes())?;
    info!(path = %path.display(), items = feed.items.len(), "Feed written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::ArtifactSink;
    use crate::types::{ArtifactKey, ArtifactRecord};
    use chrono::{FixedOffset, TimeZone, Utc};
    use tempfile::TempDir;

    fn doc() -> ArtifactDocument {
        ArtifactDocument {
            group_id: "org.example".into(),
            artifact_id: "demo".into(),
            version_latest: "1.0".into(),
            ts_publish: 1_700_000_000_000,
            ..ArtifactDocument::default()
        }
    }

    fn record(artifact: &str, ts: i64) -> ArtifactRecord {
        ArtifactRecord {
            id: String::new(),
            group_id: "org.example".into(),
            artifact_id: artifact.into(),
            latest_version: "2.0".into(),
            ts_publish: ts,
            description: String::new(),
            licenses: vec![],
            dep_count: 0,
            ref_count: 0,
            categories: vec![],
        }
    }

    #[test]
    fn test_item_defaults() {
        let cfg = FeedConfig::default();
        let item = build_item(&doc(), &cfg, None);

        insta::assert_snapshot!(item.title, @"org.example:demo 1.0 released");
        assert_eq!(item.id, "org.example:demo@1.0");
        assert_eq!(item.date_published.as_deref(), Some("2023-11-14T22:13:20Z"));
        assert!(item.date_modified.is_none());
        assert_eq!(item.tags, vec!["Artifact", "Maven", "Java"]);
        assert_eq!(item.authors[0].name, "MvnArtifactReleaseQueue");
        assert_eq!(
            item.attachments[0].url,
            format!("{}org/example/demo.svg", cfg.badge_base_url)
        );
        assert!(item.attachments[0].size_in_bytes.is_none());
    }

    #[test]
    fn test_item_uses_description_tags_and_contributors() {
        let mut d = doc();
        d.id = "pkg-1".into();
        d.description = "Fast <json> & more".into();
        d.tags = vec!["Json".into()];
        d.contributors = vec!["alice".into()];
        let item = build_item(&d, &FeedConfig::default(), Some(42));

        assert_eq!(item.id, "pkg-1@1.0");
        assert_eq!(item.title, "org.example:demo 1.0 released, Fast <json> & more");
        assert!(item.content_html.contains(r#"alt="org.example:demo 1.0 released, Fast &lt;json&gt; &amp; more""#));
        assert_eq!(item.tags, vec!["Json"]);
        assert_eq!(item.authors.len(), 2);
        assert_eq!(item.attachments[0].size_in_bytes, Some(42));
    }

    #[test]
    fn test_feed_keeps_order_and_omits_missing_documents() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::with_dirs(
            dir.path().join("Maven/Artifact"),
            dir.path().join("Badge"),
            FixedOffset::east_opt(0).unwrap(),
        );
        let now = Utc.timestamp_millis_opt(1_700_000_100_000).unwrap();
        writer.persist(&record("older", 1000), now).unwrap();
        writer.persist(&record("newer", 2000), now).unwrap();

        let entries: Vec<ReleaseQueueEntry> = ["2000|org.example|newer", "1500|org.example|gone", "1000|org.example|older"]
            .iter()
            .filter_map(|l| ReleaseQueueEntry::parse_line(l))
            .collect();
        let feed = build_feed(&entries, &writer, &FeedConfig::default()).unwrap();

        assert_eq!(feed.version, JSON_FEED_VERSION);
        let ids: Vec<&str> = feed.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["org.example:newer@2.0", "org.example:older@2.0"]);
        let key = ArtifactKey::parse("org.example:newer").unwrap();
        let size = fs::metadata(writer.badge_path(&key)).unwrap().len();
        assert_eq!(feed.items[0].attachments[0].size_in_bytes, Some(size));
    }

    #[test]
    fn test_write_feed_omits_absent_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Feed/ReleaseQueue.json");
        let writer = ArtifactWriter::with_dirs(
            dir.path().into(),
            dir.path().into(),
            FixedOffset::east_opt(0).unwrap(),
        );
        let mut feed = build_feed(&[], &writer, &FeedConfig::default()).unwrap();
        feed.items.push(build_item(&ArtifactDocument::default(), &FeedConfig::default(), None));

        write_feed(&path, &feed).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["version"], JSON_FEED_VERSION);
        assert!(value["items"][0].get("date_published").is_none());
        assert!(value["items"][0]["attachments"][0].get("size_in_bytes").is_none());
    }
}
