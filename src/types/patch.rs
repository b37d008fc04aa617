//! Single-leg patch preview types

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{LegId, LegPlan, PointId, TripId};

/// Request to preview (and optionally commit) adding a point to one leg
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewPointRequest {
    pub trip_id: TripId,
    pub leg_id: LegId,
    pub point_id: PointId,
    /// Persist the rebuilt leg when the point was placed
    #[serde(default)]
    pub commit: bool,
}

/// Why a point could not be added to a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchRejection {
    /// Already visited in this leg
    DuplicatePoint,
    /// Every reachable arrival falls outside the point's opening windows
    OutsideOperatingWindow,
    /// The visit does not fit before the end of the day
    DayOverflow,
    /// The leg drives straight through; no sightseeing
    DirectLeg,
    /// The point has no coordinates or no visit duration
    IncompletePoint,
}

impl PatchRejection {
    pub const fn as_str(self) -> &'static str {
        match self {
            PatchRejection::DuplicatePoint => "duplicate_point",
            PatchRejection::OutsideOperatingWindow => "outside_operating_window",
            PatchRejection::DayOverflow => "day_overflow",
            PatchRejection::DirectLeg => "direct_leg",
            PatchRejection::IncompletePoint => "incomplete_point",
        }
    }
}

/// A visit present in both the stored and the rebuilt leg at different times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetimedVisit {
    pub point_id: PointId,
    pub before_start: NaiveDateTime,
    pub after_start: NaiveDateTime,
}

/// Differences between two versions of the same leg
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegDiff {
    pub added_visits: Vec<PointId>,
    pub removed_visits: Vec<PointId>,
    pub retimed_visits: Vec<RetimedVisit>,
    /// Any segment differs (kind, timing, distance)
    pub segments_changed: bool,
    /// The leg now ends somewhere else, which would move the next day's start
    pub end_state_changed: bool,
}

impl LegDiff {
    pub fn is_empty(&self) -> bool {
        !self.segments_changed && !self.end_state_changed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatchOutcome {
    Placed {
        order: u32,
        start: NaiveDateTime,
        end: NaiveDateTime,
        leg: LegPlan,
        diff: LegDiff,
    },
    Rejected {
        reason: PatchRejection,
    },
}

impl PatchOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, PatchOutcome::Placed { .. })
    }
}

/// Result of a patch preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchPreview {
    pub trip_id: TripId,
    pub leg_id: LegId,
    pub point_id: PointId,
    pub outcome: PatchOutcome,
    #[serde(default)]
    pub committed: bool,
}
