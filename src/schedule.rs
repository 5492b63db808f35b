// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Weekly deep scan gate

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc, Weekday};

/// Which collection mode an invocation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Walk forward from page 0 until the watermark is reached
    Incremental,
    /// Walk the bounded namespace page range, once per ISO week
    DeepScan,
}

/// ISO `YYYY-WW` key of the week containing `date`
#[must_use]
pub fn week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-{:02}", week.year(), week.week())
}

/// Calendar date of `now` in `offset`
#[must_use]
pub fn local_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Decide the mode for today.
///
/// The deep scan is due on `deep_scan_day` unless `stored_flag` already
/// records this week.
#[must_use]
pub fn plan_run(today: NaiveDate, deep_scan_day: Weekday, stored_flag: Option<&str>) -> RunMode {
    if today.weekday() != deep_scan_day {
        return RunMode::Incremental;
    }
    if stored_flag == Some(week_key(today).as_str()) {
        RunMode::Incremental
    } else {
        RunMode::DeepScan
    }
}
