//! Scheduling error types.
//!
//! Infeasibility is never an error: a point that does not fit is a skip, a day
//! without visits is a valid leg, and a rejected patch is a result. These
//! errors only cover input that cannot be scheduled at all.

use chrono::{NaiveDate, NaiveTime};

use crate::types::{LegId, PointId, TripId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulerError {
    #[error("Leg {leg_id} ends before it starts ({start} - {end})")]
    InvalidDayWindow {
        leg_id: LegId,
        start: NaiveTime,
        end: NaiveTime,
    },

    #[error("Leg {leg_id} is dated {date}, before the leg preceding it")]
    LegsOutOfOrder { leg_id: LegId, date: NaiveDate },

    #[error("Leg {0} appears more than once in the trip")]
    DuplicateLeg(LegId),

    #[error("Leg {leg_id} is not part of trip {trip_id}")]
    UnknownLeg { trip_id: TripId, leg_id: LegId },

    #[error("Leg {0} has no stored timeline; build the trip first")]
    LegNotPlanned(LegId),

    #[error("Point {0} does not exist or is inactive")]
    UnknownPoint(PointId),
}

impl SchedulerError {
    /// Error code for the response envelope
    pub const fn code(&self) -> &'static str {
        match self {
            SchedulerError::UnknownLeg { .. }
            | SchedulerError::UnknownPoint(_)
            | SchedulerError::LegNotPlanned(_) => "NOT_FOUND",
            _ => "SCHEDULING_ERROR",
        }
    }
}
