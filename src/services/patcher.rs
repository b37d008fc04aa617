//! "Add a point to this day" previews
//!
//! Rebuilds a single leg with one extra candidate and compares it with the
//! stored version. The leg is seeded from the stored end state of the leg
//! before it, so no other leg is recomputed or modified.

use tracing::{debug, info};

use crate::error::SchedulerError;
use crate::services::candidates::{Candidate, LegCandidates};
use crate::services::geo::TravelModel;
use crate::services::plan_diff::diff_leg;
use crate::services::scheduler::ItineraryScheduler;
use crate::types::{
    LegId, PatchOutcome, PatchPreview, PatchRejection, PointId, SkipReason, TripDescriptor, TripPlan,
};

pub struct TimelinePatcher<'s, 'a, T: TravelModel> {
    scheduler: &'s ItineraryScheduler<'a, T>,
}

impl<'s, 'a, T: TravelModel> TimelinePatcher<'s, 'a, T> {
    pub fn new(scheduler: &'s ItineraryScheduler<'a, T>) -> Self {
        Self { scheduler }
    }

    /// Preview adding `point_id` to leg `leg_id` of a stored plan
    pub fn preview(
        &self,
        trip: &TripDescriptor,
        plan: &TripPlan,
        leg_id: LegId,
        point_id: PointId,
    ) -> Result<PatchPreview, SchedulerError> {
        let index = trip
            .legs
            .iter()
            .position(|l| l.id == leg_id)
            .ok_or(SchedulerError::UnknownLeg {
                trip_id: trip.id,
                leg_id,
            })?;
        let stored = plan.leg(leg_id).ok_or(SchedulerError::LegNotPlanned(leg_id))?;
        let leg = &trip.legs[index];

        let preview = |outcome: PatchOutcome| PatchPreview {
            trip_id: trip.id,
            leg_id,
            point_id,
            outcome,
            committed: false,
        };
        let rejected = |reason: PatchRejection| -> Result<PatchPreview, SchedulerError> {
            debug!("Patch of point {} into leg {} rejected: {}", point_id, leg_id, reason.as_str());
            Ok(preview(PatchOutcome::Rejected { reason }))
        };

        let snapshot = self.scheduler.snapshot();
        if stored.visits_point(point_id) {
            return rejected(PatchRejection::DuplicatePoint);
        }
        if snapshot.exclusion(point_id).is_some() {
            return rejected(PatchRejection::IncompletePoint);
        }
        let point = snapshot.point(point_id).ok_or(SchedulerError::UnknownPoint(point_id))?;
        if leg.direct {
            return rejected(PatchRejection::DirectLeg);
        }

        let previous = index
            .checked_sub(1)
            .and_then(|i| trip.legs.get(i))
            .and_then(|prev| plan.leg(prev.id));
        let ctx = self.scheduler.leg_context(trip, index, previous);

        let mut candidates: LegCandidates = self.scheduler.provider().for_leg(leg);
        let phase = LegCandidates::phase_for(point, leg);
        let place = LegCandidates::place_for(point, leg);
        if !candidates.inject(Candidate::from_point(point, place), phase) {
            debug!("Point {} is already a candidate of leg {}", point_id, leg_id);
        }

        let rebuilt = self.scheduler.build_leg(&ctx, &candidates);
        let placed = rebuilt
            .segments
            .iter()
            .find(|s| s.kind.point_id() == point_id && s.kind.as_str() == "visit")
            .map(|s| (s.order, s.start, s.end));

        match placed {
            Some((order, start, end)) => {
                let diff = diff_leg(stored, &rebuilt);
                info!(
                    "Point {} fits leg {} at position {} ({} - {}), {} visits retimed",
                    point_id,
                    leg_id,
                    order,
                    start.time(),
                    end.time(),
                    diff.retimed_visits.len()
                );
                Ok(preview(PatchOutcome::Placed {
                    order,
                    start,
                    end,
                    leg: rebuilt,
                    diff,
                }))
            }
            None => {
                let reason = match rebuilt.skip_reason(point_id) {
                    Some(SkipReason::OutsideOperatingWindow { .. }) => PatchRejection::OutsideOperatingWindow,
                    _ => PatchRejection::DayOverflow,
                };
                rejected(reason)
            }
        }
    }
}
