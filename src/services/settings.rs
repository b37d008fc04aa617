//! Scheduler tuning

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// How to read a weekday for which a point has no operating-window rows at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingWindowPolicy {
    Closed,
    AlwaysOpen,
}

impl FromStr for MissingWindowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "closed" => Ok(Self::Closed),
            "always_open" => Ok(Self::AlwaysOpen),
            other => Err(format!("unknown missing-window policy '{}' (expected closed|always_open)", other)),
        }
    }
}

impl fmt::Display for MissingWindowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::AlwaysOpen => "always_open",
        })
    }
}

/// Candidate selection within a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Single pass; a skipped point is never reconsidered in the same leg
    Greedy,
    /// A skipped point goes back into the pool after every successful visit
    DeferRetry,
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "greedy" => Ok(Self::Greedy),
            "defer_retry" => Ok(Self::DeferRetry),
            other => Err(format!("unknown selection strategy '{}' (expected greedy|defer_retry)", other)),
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Greedy => "greedy",
            Self::DeferRetry => "defer_retry",
        })
    }
}

/// Travel time model parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatorSettings {
    pub road_correction: f64,
    pub local_speed_kmh: f64,
    pub outstation_speed_kmh: f64,
    pub local_buffer_minutes: i64,
    pub outstation_buffer_minutes: i64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            road_correction: defaults::ROAD_CORRECTION_FACTOR,
            local_speed_kmh: defaults::LOCAL_SPEED_KMH,
            outstation_speed_kmh: defaults::OUTSTATION_SPEED_KMH,
            local_buffer_minutes: defaults::LOCAL_BUFFER_MINUTES,
            outstation_buffer_minutes: defaults::OUTSTATION_BUFFER_MINUTES,
        }
    }
}

/// Configuration for one scheduling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSettings {
    pub estimator: EstimatorSettings,
    /// Elapsed minutes after which a refreshment break is due
    pub refreshment_interval_minutes: i64,
    pub refreshment_minutes: i64,
    /// Vehicle parking at the night stop, 0 disables the segment
    pub parking_minutes: i64,
    pub missing_windows: MissingWindowPolicy,
    pub selection: SelectionStrategy,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            estimator: EstimatorSettings::default(),
            refreshment_interval_minutes: defaults::REFRESHMENT_INTERVAL_MINUTES,
            refreshment_minutes: defaults::REFRESHMENT_DURATION_MINUTES,
            parking_minutes: defaults::PARKING_DURATION_MINUTES,
            missing_windows: MissingWindowPolicy::Closed,
            selection: SelectionStrategy::Greedy,
        }
    }
}

impl ScheduleSettings {
    /// Check values that would make the scheduler loop or go backwards in time
    pub fn validate(&self) -> Result<(), String> {
        let e = &self.estimator;
        if e.road_correction < 1.0 {
            return Err(format!("road correction must be >= 1.0, got {}", e.road_correction));
        }
        if e.local_speed_kmh <= 0.0 || e.outstation_speed_kmh <= 0.0 {
            return Err("travel speeds must be positive".to_string());
        }
        if e.local_buffer_minutes < 0 || e.outstation_buffer_minutes < 0 {
            return Err("travel buffers must not be negative".to_string());
        }
        if self.refreshment_interval_minutes <= 0 || self.refreshment_minutes < 0 {
            return Err("refreshment interval must be positive and duration non-negative".to_string());
        }
        if self.parking_minutes < 0 {
            return Err("parking duration must not be negative".to_string());
        }
        Ok(())
    }
}
