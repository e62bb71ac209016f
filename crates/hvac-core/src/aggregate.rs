//! Trailing-window duty-cycle aggregation.
//!
//! For each sample `i` we report the share of `[time[i] - W, time[i]]` during
//! which each nested stage level was running. Readings arrive at irregular
//! intervals, so every interval between consecutive samples is weighted by its
//! exact length and attributed to the stage at its *left* endpoint (the
//! equipment is assumed to stay in a stage until the next reading).
//!
//! The window opens at the last sample at or before `time[i] - W`. When no
//! such sample exists the point lacks a full window of history and reports 0%
//! for every level; this is a normal outcome, not an error.
//!
//! [`window_at`] is the direct backward scan for a single index. [`aggregate`]
//! computes every index in one pass: prefix sums over the intervals plus a
//! window-start pointer that only moves forward as `i` grows.

use hvac_common::{Sample, STAGE_LEVELS};
use serde::{Deserialize, Serialize};

pub use hvac_config::DEFAULT_WINDOW_SECS;

/// Seconds spent in each nested level over a span of intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageTimes {
    /// Length of the covered span (denominator).
    pub total: i64,
    pub stage1: i64,
    pub stage2: i64,
    pub stage3: i64,
}

impl StageTimes {
    /// Credit an interval of `delta` seconds that began in `stage`.
    fn add_interval(&mut self, delta: i64, stage: hvac_common::Stage) {
        self.total = self.total.saturating_add(delta);
        if stage.is_active(1) {
            self.stage1 = self.stage1.saturating_add(delta);
        }
        if stage.is_active(2) {
            self.stage2 = self.stage2.saturating_add(delta);
        }
        if stage.is_active(3) {
            self.stage3 = self.stage3.saturating_add(delta);
        }
    }

    /// Difference of two cumulative totals.
    fn since(&self, earlier: &StageTimes) -> StageTimes {
        StageTimes {
            total: self.total - earlier.total,
            stage1: self.stage1 - earlier.stage1,
            stage2: self.stage2 - earlier.stage2,
            stage3: self.stage3 - earlier.stage3,
        }
    }

    /// Percent of `total` per level; all zero when nothing was covered.
    pub fn percentages(&self) -> StagePercent {
        if self.total <= 0 {
            return StagePercent::default();
        }
        let total = self.total as f64;
        StagePercent {
            stage1: 100.0 * self.stage1 as f64 / total,
            stage2: 100.0 * self.stage2 as f64 / total,
            stage3: 100.0 * self.stage3 as f64 / total,
        }
    }
}

/// Duty-cycle percentages for the three nested levels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StagePercent {
    pub stage1: f64,
    pub stage2: f64,
    pub stage3: f64,
}

impl StagePercent {
    pub fn as_array(&self) -> [f64; STAGE_LEVELS] {
        [self.stage1, self.stage2, self.stage3]
    }
}

/// Derived per-sample result. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    pub time: i64,
    pub stage_percent: StagePercent,
    /// No sample lies at or before `time - W`; percentages are all zero.
    pub insufficient_history: bool,
}

impl AggregatedPoint {
    fn insufficient(time: i64) -> Self {
        Self {
            time,
            stage_percent: StagePercent::default(),
            insufficient_history: true,
        }
    }

    fn from_times(time: i64, times: &StageTimes) -> Self {
        Self {
            time,
            stage_percent: times.percentages(),
            insufficient_history: false,
        }
    }
}

/// Stage times for the window ending at `samples[index]`, by backward scan.
///
/// Returns `None` when `index` is out of bounds or the history before it is
/// shorter than `window`. `samples` must be ascending by time.
pub fn window_at(samples: &[Sample], index: usize, window: i64) -> Option<StageTimes> {
    let end = samples.get(index)?;
    let start_time = end.time.saturating_sub(window);

    let start = (0..=index).rev().find(|&j| samples[j].time <= start_time)?;

    let mut times = StageTimes::default();
    for k in (start + 1)..=index {
        let delta = samples[k].time.saturating_sub(samples[k - 1].time);
        times.add_interval(delta, samples[k - 1].stage);
    }
    Some(times)
}

/// Aggregated point for one index, by backward scan.
pub fn point_at(samples: &[Sample], index: usize, window: i64) -> Option<AggregatedPoint> {
    let time = samples.get(index)?.time;
    Some(match window_at(samples, index, window) {
        Some(times) => AggregatedPoint::from_times(time, &times),
        None => AggregatedPoint::insufficient(time),
    })
}

/// Aggregated points for every sample, in one forward pass.
///
/// `samples` must be ascending by time (as returned by a range query).
pub fn aggregate(samples: &[Sample], window: i64) -> Vec<AggregatedPoint> {
    debug_assert!(
        samples.windows(2).all(|w| w[0].time <= w[1].time),
        "samples must be sorted by time"
    );

    // cumulative[k] covers the intervals (0,1) .. (k-1,k).
    let mut cumulative = Vec::with_capacity(samples.len());
    let mut running = StageTimes::default();
    for (k, sample) in samples.iter().enumerate() {
        if k > 0 {
            let prev = &samples[k - 1];
            running.add_interval(sample.time.saturating_sub(prev.time), prev.stage);
        }
        cumulative.push(running);
    }

    // Count of leading samples at or before the current window start.
    let mut covered = 0usize;
    samples
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let start_time = sample.time.saturating_sub(window);
            while covered <= i && samples[covered].time <= start_time {
                covered += 1;
            }
            match covered.checked_sub(1) {
                Some(start) => {
                    AggregatedPoint::from_times(sample.time, &cumulative[i].since(&cumulative[start]))
                }
                None => AggregatedPoint::insufficient(sample.time),
            }
        })
        .collect()
}
