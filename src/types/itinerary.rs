//! Itinerary timeline types
//!
//! A trip is an ordered list of [`Leg`]s (one per day and location pair). The
//! scheduler turns each leg into a [`LegPlan`]: an ordered, gap-free list of
//! [`TimelineSegment`]s.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{Coordinates, Location, PointId};

pub type TripId = i64;
pub type LegId = i64;

/// Trip descriptor handed over by the route resolution layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDescriptor {
    pub id: TripId,
    pub legs: Vec<Leg>,
}

/// One day's movement from one place to the next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub id: LegId,
    pub order: i32,
    pub from: Location,
    pub to: Location,
    pub date: NaiveDate,
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    /// No sightseeing: drive straight to the next place
    #[serde(default)]
    pub direct: bool,
}

impl Leg {
    pub fn day_start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.day_start)
    }

    pub fn day_end_at(&self) -> NaiveDateTime {
        self.date.and_time(self.day_end)
    }
}

/// Road class used to pick speed and buffer for a hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelClass {
    Local,
    Outstation,
}

impl TravelClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            TravelClass::Local => "local",
            TravelClass::Outstation => "outstation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(TravelClass::Local),
            "outstation" => Some(TravelClass::Outstation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelSegment {
    /// Point travelled from, `0` for a place (leg origin, hotel)
    pub from_point: PointId,
    /// Point travelled to, `0` for the leg destination
    pub to_point: PointId,
    pub distance_km: f64,
    pub travel_minutes: i64,
    pub class: TravelClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitSegment {
    pub point_id: PointId,
}

/// What happens during a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentKind {
    TripStart,
    Travel(TravelSegment),
    Refreshment,
    Visit(VisitSegment),
    Parking,
    HotelArrival,
    HotelDeparture,
    Checkout,
}

impl SegmentKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::TripStart => "trip_start",
            SegmentKind::Travel(_) => "travel",
            SegmentKind::Refreshment => "refreshment",
            SegmentKind::Visit(_) => "visit",
            SegmentKind::Parking => "parking",
            SegmentKind::HotelArrival => "hotel_arrival",
            SegmentKind::HotelDeparture => "hotel_departure",
            SegmentKind::Checkout => "checkout",
        }
    }

    /// Point referenced by the segment, `0` when none
    pub fn point_id(&self) -> PointId {
        match self {
            SegmentKind::Visit(v) => v.point_id,
            SegmentKind::Travel(t) => t.to_point,
            _ => 0,
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            SegmentKind::TripStart
                | SegmentKind::HotelArrival
                | SegmentKind::HotelDeparture
                | SegmentKind::Checkout
        )
    }
}

/// One time-stamped entry of a leg's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSegment {
    pub leg_id: LegId,
    pub order: u32,
    #[serde(flatten)]
    pub kind: SegmentKind,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Why a candidate point did not make it into a leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The visit would not sit inside a single opening window
    OutsideOperatingWindow { arrival: NaiveDateTime },
    /// The visit (plus the drive to the night stop) would end after day end
    DayOverflow { would_end: NaiveDateTime },
    /// The day ran out before the point was attempted
    DayExhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedPoint {
    pub point_id: PointId,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Non-fatal observations about a built leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum LegNotice {
    /// The mandatory transfer to the destination alone ends after day end
    TransferOverrun { minutes_over: i64 },
}

/// Where and when a leg leaves the traveller; seeds the next leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegEndState {
    /// Normalized place name
    pub place: String,
    pub coordinates: Coordinates,
    /// Last visited point when the day ended next to it
    pub last_point: Option<PointId>,
    pub at: NaiveDateTime,
}

/// Built timeline of a single leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegPlan {
    pub leg_id: LegId,
    pub date: NaiveDate,
    pub segments: Vec<TimelineSegment>,
    #[serde(default)]
    pub skipped: Vec<SkippedPoint>,
    pub end_state: LegEndState,
    #[serde(default)]
    pub notices: Vec<LegNotice>,
}

impl LegPlan {
    /// Visit segments in timeline order
    pub fn visits(&self) -> impl Iterator<Item = (&TimelineSegment, PointId)> {
        self.segments.iter().filter_map(|s| match &s.kind {
            SegmentKind::Visit(v) => Some((s, v.point_id)),
            _ => None,
        })
    }

    pub fn visits_point(&self, point_id: PointId) -> bool {
        self.visits().any(|(_, id)| id == point_id)
    }

    pub fn skip_reason(&self, point_id: PointId) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|s| s.point_id == point_id)
            .map(|s| &s.reason)
    }
}

/// Full plan of a trip: one [`LegPlan`] per leg, in leg order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    pub trip_id: TripId,
    pub legs: Vec<LegPlan>,
}

impl TripPlan {
    pub fn leg(&self, leg_id: LegId) -> Option<&LegPlan> {
        self.legs.iter().find(|l| l.leg_id == leg_id)
    }

    pub fn total_visits(&self) -> usize {
        self.legs.iter().map(|l| l.visits().count()).sum()
    }
}
