// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Incremental and deep-scan collection
//!
//! One invocation evaluates the weekly gate once, runs either the deep scan
//! or the incremental pass (falling back to incremental when the deep scan
//! does not complete), then compacts the release queue.

use crate::client::ComponentSource;
use crate::config::Config;
use crate::index::ArtifactIndex;
use crate::persist::ArtifactSink;
use crate::queue::{compact_store, Compaction};
use crate::schedule::{local_date, plan_run, week_key, RunMode};
use crate::store::StateStore;
use crate::types::{ArtifactRecord, ReleaseQueueEntry};
use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc, Weekday};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Collection settings resolved from [`Config`]
#[derive(Debug, Clone)]
pub struct CollectSettings {
    /// Weekday of the deep scan
    pub deep_scan_day: Weekday,
    /// Search term of the deep scan
    pub deep_scan_search_term: String,
    /// First (highest) page of the deep scan
    pub deep_scan_start_page: u32,
    /// Page cap for one incremental pass
    pub max_incremental_pages: u32,
    /// Offset used to decide what "today" is
    pub offset: FixedOffset,
    /// Release queue expiry window
    pub queue_expiry: Duration,
}

impl CollectSettings {
    /// Resolve from configuration
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self {
            deep_scan_day: cfg.collect.deep_scan_weekday()?,
            deep_scan_search_term: cfg.collect.deep_scan_search_term.clone(),
            deep_scan_start_page: cfg.collect.deep_scan_start_page,
            max_incremental_pages: cfg.collect.max_incremental_pages,
            offset: cfg.collect.offset()?,
            queue_expiry: Duration::from_secs(cfg.queue.expiry_mins * 60),
        })
    }
}

/// Why a pass stopped paging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The API answered with no components
    EmptyPage,
    /// A page had components but none with a usable identity
    NoValidRecords,
    /// The page reached data older than the watermark
    ReachedWatermark,
    /// The incremental page cap was hit
    PageLimit,
    /// The deep scan reached page 0
    RangeExhausted,
    /// A page could not be fetched
    FetchFailed,
}

/// Outcome of one pass over the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    /// Mode of the pass
    pub mode: RunMode,
    /// Pages successfully fetched
    pub pages: u32,
    /// Records persisted
    pub processed: usize,
    /// Records skipped for lacking an identity
    pub skipped: usize,
    /// Identities added to the index
    pub new_identities: usize,
    /// Why paging stopped
    pub halt: HaltReason,
    /// Fetch error message when `halt` is `FetchFailed`
    pub fetch_error: Option<String>,
    /// Watermark written by this pass
    pub watermark: Option<i64>,
}

impl PassSummary {
    fn new(mode: RunMode) -> Self {
        Self {
            mode,
            pages: 0,
            processed: 0,
            skipped: 0,
            new_identities: 0,
            halt: HaltReason::EmptyPage,
            fetch_error: None,
            watermark: None,
        }
    }

    /// A pass succeeded if it was not cut short and persisted something
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.fetch_error.is_none() && self.processed > 0
    }
}

/// Outcome of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Mode chosen by the weekly gate (or forced)
    pub planned: RunMode,
    /// Deep scan pass, if one ran
    pub deep_scan: Option<PassSummary>,
    /// Incremental pass, if one ran
    pub incremental: Option<PassSummary>,
    /// Week key written after a successful deep scan
    pub week_key_written: Option<String>,
    /// Release queue compaction
    pub compaction: Compaction,
}

/// Drives a collection run against a source, a sink and a state store
pub struct Collector<'a> {
    source: &'a dyn ComponentSource,
    sink: &'a dyn ArtifactSink,
    store: &'a mut dyn StateStore,
    settings: &'a CollectSettings,
}

impl<'a> Collector<'a> {
    /// Create a collector
    pub fn new(
        source: &'a dyn ComponentSource,
        sink: &'a dyn ArtifactSink,
        store: &'a mut dyn StateStore,
        settings: &'a CollectSettings,
    ) -> Self {
        Self { source, sink, store, settings }
    }

    /// Run one invocation: weekly gate, collection, queue compaction.
    ///
    /// `force` bypasses the weekly gate.
    pub fn run(&mut self, now: DateTime<Utc>, force: Option<RunMode>) -> Result<RunReport> {
        let today = local_date(now, self.settings.offset);
        let week = week_key(today);
        let stored = self.store.weekly_flag()?;
        let planned = force.unwrap_or_else(|| plan_run(today, self.settings.deep_scan_day, stored.as_deref()));
        info!(%today, %week, stored_week = ?stored, mode = ?planned, "Starting collection");

        let mut deep_scan = None;
        let mut incremental = None;
        let mut week_key_written = None;

        if planned == RunMode::DeepScan {
            let pass = self.deep_scan(now)?;
            if pass.succeeded() {
                self.store.set_weekly_flag(&week)?;
                week_key_written = Some(week);
            } else {
                warn!(halt = ?pass.halt, "Deep scan did not complete, falling back to incremental collection");
                incremental = Some(self.incremental(now)?);
            }
            deep_scan = Some(pass);
        } else {
            incremental = Some(self.incremental(now)?);
        }

        let compaction = compact_store(&mut *self.store, now.timestamp_millis(), self.settings.queue_expiry)?;

        Ok(RunReport {
            planned,
            deep_scan,
            incremental,
            week_key_written,
            compaction,
        })
    }

    /// Walk forward from page 0 until the watermark is reached
    pub fn incremental(&mut self, now: DateTime<Utc>) -> Result<PassSummary> {
        let now_ms = now.timestamp_millis();
        let watermark = self.store.watermark()?;
        let mut index = self.store.load_index()?;
        info!(watermark, indexed = index.len(), "Incremental collection");

        let mut summary = PassSummary::new(RunMode::Incremental);
        let mut new_watermark = None;
        let mut page = 0;

        summary.halt = loop {
            if page >= self.settings.max_incremental_pages {
                warn!(page, "Incremental page limit reached");
                break HaltReason::PageLimit;
            }
            let components = match self.source.fetch_page(page, "") {
                Ok(components) => components,
                Err(e) => {
                    error!(page, error = %e, "Fetch failed, stopping");
                    summary.fetch_error = Some(e.to_string());
                    break HaltReason::FetchFailed;
                }
            };
            summary.pages += 1;
            if components.is_empty() {
                info!(page, "No more components");
                break HaltReason::EmptyPage;
            }

            let records: Vec<ArtifactRecord> = components
                .iter()
                .map(|c| ArtifactRecord::from_component(c, now_ms))
                .collect();
            if page == 0 {
                new_watermark = records.first().map(|r| r.ts_publish);
            }

            let page_processed = self.process_records(&records, &mut index, now, &mut summary)?;
            if page_processed == 0 {
                info!(page, "Page had no valid components, stopping");
                break HaltReason::NoValidRecords;
            }

            let page_min = records.iter().map(|r| r.ts_publish).min().unwrap_or(i64::MIN);
            if page_min < watermark {
                info!(page, page_min, watermark, "Reached already processed components");
                break HaltReason::ReachedWatermark;
            }
            debug!(page, page_processed, "page.done");
            page += 1;
        };

        if summary.processed > 0 {
            self.store.save_index(&index)?;
            match new_watermark {
                _ if summary.halt == HaltReason::FetchFailed => {
                    warn!(watermark, "Collection was interrupted, watermark left unchanged");
                }
                Some(ts) => {
                    let next = ts.max(watermark);
                    self.store.set_watermark(next)?;
                    summary.watermark = Some(next);
                }
                None => {}
            }
        } else {
            info!("No new components, state unchanged");
        }

        info!(
            pages = summary.pages,
            processed = summary.processed,
            new = summary.new_identities,
            halt = ?summary.halt,
            "Incremental collection finished"
        );
        Ok(summary)
    }

    /// Walk the namespace page range downward from the start page
    pub fn deep_scan(&mut self, now: DateTime<Utc>) -> Result<PassSummary> {
        let now_ms = now.timestamp_millis();
        let mut index = self.store.load_index()?;
        let search_term = self.settings.deep_scan_search_term.clone();
        info!(
            %search_term,
            start_page = self.settings.deep_scan_start_page,
            indexed = index.len(),
            "Deep scan"
        );

        let mut summary = PassSummary::new(RunMode::DeepScan);
        summary.halt = HaltReason::RangeExhausted;

        for page in (0..=self.settings.deep_scan_start_page).rev() {
            let components = match self.source.fetch_page(page, &search_term) {
                Ok(components) => components,
                Err(e) => {
                    error!(page, error = %e, "Fetch failed, stopping deep scan");
                    summary.fetch_error = Some(e.to_string());
                    summary.halt = HaltReason::FetchFailed;
                    break;
                }
            };
            summary.pages += 1;
            if components.is_empty() {
                info!(page, "No components on page, stopping deep scan");
                summary.halt = HaltReason::EmptyPage;
                break;
            }

            let records: Vec<ArtifactRecord> = components
                .iter()
                .map(|c| ArtifactRecord::from_component(c, now_ms))
                .collect();
            if self.process_records(&records, &mut index, now, &mut summary)? == 0 {
                info!(page, "Page had no valid components, stopping deep scan");
                summary.halt = HaltReason::NoValidRecords;
                break;
            }
        }

        if summary.processed > 0 {
            self.store.save_index(&index)?;
        }

        info!(
            pages = summary.pages,
            processed = summary.processed,
            new = summary.new_identities,
            halt = ?summary.halt,
            "Deep scan finished"
        );
        Ok(summary)
    }

    /// Persist valid records, record them in the index and the release queue
    fn process_records(
        &mut self,
        records: &[ArtifactRecord],
        index: &mut ArtifactIndex,
        now: DateTime<Utc>,
        summary: &mut PassSummary,
    ) -> Result<usize> {
        let mut processed = 0;
        for record in records {
            let Some(key) = record.key() else {
                warn!(
                    group_id = %record.group_id,
                    artifact_id = %record.artifact_id,
                    "Skipping invalid component"
                );
                summary.skipped += 1;
                continue;
            };

            self.sink.persist(record, now)?;
            if index.insert(&key) {
                summary.new_identities += 1;
            }
            self.store.append_release(&ReleaseQueueEntry {
                ts_publish: record.ts_publish,
                key: key.clone(),
            })?;

            info!(
                %key,
                version = %record.latest_version,
                ts = record.ts_publish,
                deps = record.dep_count,
                refs = record.ref_count,
                categories = %record.categories.join(", "),
                "Collected artifact"
            );
            processed += 1;
        }
        summary.processed += processed;
        Ok(processed)
    }
}
