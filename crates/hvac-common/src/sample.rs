//! The sample record and equipment stage types.
//!
//! A sample is one reading from the controller: when it was taken, which
//! equipment stage was running, and the air temperature and humidity at that
//! moment. Stages are nested: stage `k` implies stages `1..k` are also on.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of nested equipment stage levels above "off".
pub const STAGE_LEVELS: usize = 3;

/// Error building a [`Stage`] from a raw integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stage {0} outside 0..={max}", max = STAGE_LEVELS)]
pub struct StageError(pub i64);

/// Equipment stage, 0 (idle) through 3 (all three stages running).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Stage(u8);

impl Stage {
    pub const IDLE: Stage = Stage(0);
    pub const MAX: Stage = Stage(STAGE_LEVELS as u8);

    /// Build a stage, rejecting values outside the nested domain.
    pub fn new(value: i64) -> Result<Self, StageError> {
        if (0..=STAGE_LEVELS as i64).contains(&value) {
            Ok(Stage(value as u8))
        } else {
            Err(StageError(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether nested level `level` (1-based) counts as running in this stage.
    pub fn is_active(self, level: u8) -> bool {
        level >= 1 && self.0 >= level
    }
}

impl TryFrom<i64> for Stage {
    type Error = StageError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Stage::new(value)
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.0
    }
}

impl From<Stage> for i64 {
    fn from(stage: Stage) -> Self {
        i64::from(stage.0)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stored reading. `time` (epoch seconds) is the primary key.
///
/// Serializes as the compact tuple `[time, stage, temperature, humidity]`,
/// the same layout the ingestion payload uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "SampleTuple", try_from = "SampleTuple")]
pub struct Sample {
    pub time: i64,
    pub stage: Stage,
    pub temperature: f64,
    pub humidity: f64,
}

type SampleTuple = (i64, i64, f64, f64);

impl Sample {
    pub fn new(time: i64, stage: Stage, temperature: f64, humidity: f64) -> Self {
        Self {
            time,
            stage,
            temperature,
            humidity,
        }
    }
}

impl From<Sample> for SampleTuple {
    fn from(s: Sample) -> Self {
        (s.time, i64::from(s.stage), s.temperature, s.humidity)
    }
}

impl TryFrom<SampleTuple> for Sample {
    type Error = StageError;

    fn try_from((time, stage, temperature, humidity): SampleTuple) -> Result<Self, Self::Error> {
        Ok(Sample::new(time, Stage::new(stage)?, temperature, humidity))
    }
}
