//! Range queries for the presentation boundary.
//!
//! Resolves caller-supplied `hours` and `end` into epoch bounds, reads the
//! range from the store, and pairs every raw sample with its duty-cycle
//! point. Reads are all-or-nothing: any storage error fails the query.

use crate::aggregate::{aggregate, AggregatedPoint, StagePercent};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use hvac_common::{Sample, Stage, SCHEMA_VERSION};
use hvac_config::{MAX_HOURS, MIN_HOURS};
use hvac_store::{SampleStore, StorageError};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SECS_PER_HOUR: i64 = 3600;

/// Formats accepted for a local end time, most specific first.
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Inclusive epoch bounds for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRange {
    pub start: i64,
    pub end: i64,
    pub hours: i64,
}

impl QueryRange {
    /// Resolve a trailing span ending at `end` (or `now`).
    ///
    /// `hours` defaults to `default_hours` and is clamped into
    /// `MIN_HOURS..=MAX_HOURS`. An `end` that does not parse falls back to `now`.
    pub fn resolve(hours: Option<i64>, end: Option<&str>, now: i64, default_hours: i64) -> Self {
        let hours = clamp_hours(hours.unwrap_or(default_hours));
        let end = match end.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => parse_end_time(raw).unwrap_or_else(|| {
                debug!(end = raw, "unparseable end time, using now");
                now
            }),
            None => now,
        };
        Self {
            start: end.saturating_sub(hours * SECS_PER_HOUR),
            end,
            hours,
        }
    }
}

/// Clamp a requested span into the supported range.
pub fn clamp_hours(hours: i64) -> i64 {
    hours.clamp(MIN_HOURS, MAX_HOURS)
}

/// Parse an end time as epoch seconds, RFC 3339, or a local date-time.
pub fn parse_end_time(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(epoch) = raw.parse::<i64>() {
        return Some(epoch);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    for fmt in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return local_timestamp(&naive);
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    local_timestamp(&date.and_hms_opt(0, 0, 0)?)
}

fn local_timestamp(naive: &NaiveDateTime) -> Option<i64> {
    Local
        .from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.timestamp())
}

/// Local ISO-8601 rendering used for plot axes.
pub fn iso_local(epoch: i64) -> String {
    match Local.timestamp_opt(epoch, 0).single() {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => Utc
            .timestamp_opt(epoch, 0)
            .single()
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_default(),
    }
}

/// One plotted point: the raw reading plus its duty-cycle percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub time: i64,
    pub iso_time: String,
    pub stage: Stage,
    pub temperature: f64,
    pub humidity: f64,
    pub stage_percent: StagePercent,
    pub insufficient_history: bool,
}

impl SeriesPoint {
    fn new(sample: &Sample, point: &AggregatedPoint) -> Self {
        Self {
            time: sample.time,
            iso_time: iso_local(sample.time),
            stage: sample.stage,
            temperature: sample.temperature,
            humidity: sample.humidity,
            stage_percent: point.stage_percent,
            insufficient_history: point.insufficient_history,
        }
    }
}

/// Options for [`build_series`].
#[derive(Debug, Clone, Copy)]
pub struct SeriesOptions {
    /// Trailing window in seconds.
    pub window_secs: i64,
    /// Also read the `window_secs` before `start`, plus the last sample before
    /// that, so early points have history. Those extra samples are not returned.
    pub warmup: bool,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            window_secs: crate::aggregate::DEFAULT_WINDOW_SECS,
            warmup: false,
        }
    }
}

/// Query response handed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesReport {
    pub schema_version: String,
    pub start: i64,
    pub end: i64,
    pub hours: i64,
    pub window_secs: i64,
    pub count: usize,
    /// Last reading in range, for the "current" readouts.
    pub latest: Option<Sample>,
    pub points: Vec<SeriesPoint>,
}

/// Read `range` and compute duty cycles for every sample in it.
pub fn build_series(
    store: &SampleStore,
    range: &QueryRange,
    options: &SeriesOptions,
) -> Result<SeriesReport, StorageError> {
    let samples = if options.warmup {
        let read_start = range.start.saturating_sub(options.window_secs.max(0));
        // The window for `start` opens at the last sample at or before
        // `start - W`, which usually lies before `read_start`.
        let mut samples: Vec<Sample> = store.latest_before(read_start)?.into_iter().collect();
        samples.extend(store.query_range(read_start, range.end)?);
        samples
    } else {
        store.query_range(range.start, range.end)?
    };
    let aggregated = aggregate(&samples, options.window_secs);

    let points: Vec<SeriesPoint> = samples
        .iter()
        .zip(aggregated.iter())
        .filter(|(s, _)| s.time >= range.start)
        .map(|(s, p)| SeriesPoint::new(s, p))
        .collect();

    let latest = samples.iter().rev().find(|s| s.time >= range.start).copied();
    debug!(
        start = range.start,
        end = range.end,
        count = points.len(),
        "series built"
    );

    Ok(SeriesReport {
        schema_version: SCHEMA_VERSION.to_string(),
        start: range.start,
        end: range.end,
        hours: range.hours,
        window_secs: options.window_secs,
        count: points.len(),
        latest,
        points,
    })
}
