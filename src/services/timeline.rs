//! Per-leg timeline construction.
//!
//! Walks a leg's candidate pools in phase order and greedily appends
//! travel + visit pairs while the point is open for the whole visit and the
//! day still has room for the closing drive to the night stop. This does NOT
//! backtrack: a rejected point is not retried at a later arrival time unless
//! the `DeferRetry` strategy is selected.

use chrono::{Datelike, Duration, NaiveDateTime};
use tracing::debug;

use crate::services::candidates::{next_nearest, Candidate, LegCandidates, Phase};
use crate::services::geo::{round_km, TravelEstimate, TravelModel};
use crate::services::opening_hours::OperatingWindowCatalog;
use crate::services::settings::{ScheduleSettings, SelectionStrategy};
use crate::types::{
    normalize_place, Coordinates, Leg, LegEndState, LegNotice, LegPlan, PointId, SegmentKind,
    SkipReason, SkippedPoint, TimelineSegment, TravelClass, TravelSegment, VisitSegment,
};

/// How a leg opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegOpening {
    /// First leg of the trip
    TripStart,
    /// Morning after a night at a hotel
    HotelDeparture,
    /// Later leg on the same date; no marker
    Continuation,
}

/// How a leg closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegClosing {
    /// Next leg is on a later date: hotel arrival and parking
    Overnight,
    /// Last leg of the trip
    Checkout,
    /// Next leg continues on the same date
    Continuation,
}

/// Everything the builder needs to know about where a leg starts
#[derive(Debug, Clone)]
pub struct LegContext<'a> {
    pub leg: &'a Leg,
    pub opening: LegOpening,
    pub closing: LegClosing,
    pub start_at: NaiveDateTime,
    /// Normalized place the traveller is in at `start_at`
    pub start_place: String,
    pub start_position: Coordinates,
    /// Point the traveller woke up next to, if any
    pub start_point: Option<PointId>,
}

impl<'a> LegContext<'a> {
    /// Context for a leg that starts fresh at its own origin
    pub fn at_origin(leg: &'a Leg, opening: LegOpening, closing: LegClosing) -> Self {
        Self {
            leg,
            opening,
            closing,
            start_at: leg.day_start_at(),
            start_place: normalize_place(&leg.from.name),
            start_position: leg.from.coordinates,
            start_point: None,
        }
    }
}

/// Local when both ends are in the same place
pub fn travel_class(from_place: &str, to_place: &str) -> TravelClass {
    if from_place == to_place {
        TravelClass::Local
    } else {
        TravelClass::Outstation
    }
}

/// Where the builder stands between transitions
#[derive(Debug, Clone)]
struct Cursor {
    at: NaiveDateTime,
    position: Coordinates,
    place: String,
    point: Option<PointId>,
    last_break: NaiveDateTime,
}

/// Accepted transition, not yet committed
struct Placement {
    hop: TravelEstimate,
    class: TravelClass,
    arrival: NaiveDateTime,
    departure: NaiveDateTime,
}

/// Segment list under construction
struct Timeline {
    leg_id: i64,
    segments: Vec<TimelineSegment>,
}

impl Timeline {
    fn push(&mut self, kind: SegmentKind, start: NaiveDateTime, end: NaiveDateTime) {
        let order = self.segments.len() as u32 + 1;
        self.segments.push(TimelineSegment {
            leg_id: self.leg_id,
            order,
            kind,
            start,
            end,
        });
    }

    fn marker(&mut self, kind: SegmentKind, at: NaiveDateTime) {
        debug_assert!(kind.is_marker());
        self.push(kind, at, at);
    }
}

pub struct LegTimelineBuilder<'a, T: TravelModel> {
    windows: &'a OperatingWindowCatalog,
    travel: &'a T,
    settings: &'a ScheduleSettings,
}

impl<'a, T: TravelModel> LegTimelineBuilder<'a, T> {
    pub fn new(windows: &'a OperatingWindowCatalog, travel: &'a T, settings: &'a ScheduleSettings) -> Self {
        Self {
            windows,
            travel,
            settings,
        }
    }

    /// Build the timeline of one leg
    pub fn build(&self, ctx: &LegContext<'_>, candidates: &LegCandidates) -> LegPlan {
        let leg = ctx.leg;
        let mut timeline = Timeline {
            leg_id: leg.id,
            segments: Vec::new(),
        };
        let mut cursor = Cursor {
            at: ctx.start_at,
            position: ctx.start_position,
            place: ctx.start_place.clone(),
            point: ctx.start_point,
            last_break: ctx.start_at,
        };

        match ctx.opening {
            LegOpening::TripStart => timeline.marker(SegmentKind::TripStart, cursor.at),
            LegOpening::HotelDeparture => timeline.marker(SegmentKind::HotelDeparture, cursor.at),
            LegOpening::Continuation => {}
        }

        let mut skipped = Vec::new();
        if !leg.direct && !candidates.is_empty() {
            self.visit_candidates(ctx, &mut cursor, &mut timeline, candidates, &mut skipped);
        }
        let notices = self.close(ctx, &mut cursor, &mut timeline);

        debug!(
            "Leg {} built: {} segments, {} skipped",
            leg.id,
            timeline.segments.len(),
            skipped.len()
        );

        LegPlan {
            leg_id: leg.id,
            date: leg.date,
            segments: timeline.segments,
            skipped,
            end_state: LegEndState {
                place: cursor.place,
                coordinates: cursor.position,
                last_point: cursor.point,
                at: cursor.at,
            },
            notices,
        }
    }

    fn visit_candidates(
        &self,
        ctx: &LegContext<'_>,
        cursor: &mut Cursor,
        timeline: &mut Timeline,
        candidates: &LegCandidates,
        skipped: &mut Vec<SkippedPoint>,
    ) {
        let day_end = ctx.leg.day_end_at();

        for phase in Phase::ALL {
            let mut pool: Vec<Candidate> = candidates.pool(phase).to_vec();
            let mut deferred: Vec<(Candidate, SkipReason)> = Vec::new();

            while let Some(idx) = next_nearest(&pool, &cursor.position) {
                if cursor.at >= day_end {
                    break;
                }
                self.maybe_refresh(ctx, cursor, timeline);

                let candidate = pool.remove(idx);
                match self.attempt(ctx, cursor, &candidate) {
                    Ok(placement) => {
                        commit(timeline, cursor, &candidate, placement);
                        if self.settings.selection == SelectionStrategy::DeferRetry {
                            pool.extend(deferred.drain(..).map(|(c, _)| c));
                        }
                    }
                    Err(reason) => {
                        debug!("Leg {}: skipping point {} ({:?})", ctx.leg.id, candidate.point_id, reason);
                        match self.settings.selection {
                            SelectionStrategy::Greedy => skipped.push(SkippedPoint {
                                point_id: candidate.point_id,
                                reason,
                            }),
                            SelectionStrategy::DeferRetry => deferred.push((candidate, reason)),
                        }
                    }
                }
            }

            skipped.extend(
                deferred
                    .into_iter()
                    .map(|(c, reason)| SkippedPoint { point_id: c.point_id, reason }),
            );
            // Whatever is left was never attempted: the day ran out
            skipped.extend(pool.into_iter().map(|c| SkippedPoint {
                point_id: c.point_id,
                reason: SkipReason::DayExhausted,
            }));
        }
    }

    /// Check whether `candidate` can be visited next
    fn attempt(&self, ctx: &LegContext<'_>, cursor: &Cursor, candidate: &Candidate) -> Result<Placement, SkipReason> {
        let class = travel_class(&cursor.place, &candidate.place);
        let hop = self.travel.estimate(&cursor.position, &candidate.coordinates, class);
        let arrival = cursor.at + Duration::minutes(hop.minutes);
        let departure = arrival + Duration::minutes(candidate.visit_minutes);

        let weekday = arrival.weekday();
        let open = if departure.date() == arrival.date() {
            self.windows
                .is_open(candidate.point_id, weekday, arrival.time(), departure.time())
        } else {
            self.windows.is_always_open(candidate.point_id, weekday)
        };
        if !open {
            return Err(SkipReason::OutsideOperatingWindow { arrival });
        }

        let must_end = departure
            + Duration::minutes(self.closing_reserve(ctx, &candidate.coordinates, &candidate.place));
        if must_end > ctx.leg.day_end_at() {
            return Err(SkipReason::DayOverflow { would_end: must_end });
        }

        Ok(Placement {
            hop,
            class,
            arrival,
            departure,
        })
    }

    /// Minutes that must stay free after leaving `position` in `place`:
    /// the drive to the destination plus parking on an overnight leg
    fn closing_reserve(&self, ctx: &LegContext<'_>, position: &Coordinates, place: &str) -> i64 {
        let destination = normalize_place(&ctx.leg.to.name);
        let transfer = if place == destination {
            0
        } else {
            self.travel
                .estimate(position, &ctx.leg.to.coordinates, travel_class(place, &destination))
                .minutes
        };
        let parking = match ctx.closing {
            LegClosing::Overnight => self.settings.parking_minutes,
            _ => 0,
        };
        transfer + parking
    }

    fn maybe_refresh(&self, ctx: &LegContext<'_>, cursor: &mut Cursor, timeline: &mut Timeline) {
        let duration = self.settings.refreshment_minutes;
        if duration == 0 {
            return;
        }
        if cursor.at - cursor.last_break < Duration::minutes(self.settings.refreshment_interval_minutes) {
            return;
        }
        let end = cursor.at + Duration::minutes(duration);
        let reserve = self.closing_reserve(ctx, &cursor.position, &cursor.place);
        if end + Duration::minutes(reserve) > ctx.leg.day_end_at() {
            return;
        }

        timeline.push(SegmentKind::Refreshment, cursor.at, end);
        cursor.at = end;
        cursor.last_break = end;
    }

    /// Drive to the destination if not there yet, then the night-stop or checkout markers
    fn close(&self, ctx: &LegContext<'_>, cursor: &mut Cursor, timeline: &mut Timeline) -> Vec<LegNotice> {
        let leg = ctx.leg;
        let destination = normalize_place(&leg.to.name);

        if leg.direct || cursor.place != destination {
            let class = travel_class(&cursor.place, &destination);
            let hop = self.travel.estimate(&cursor.position, &leg.to.coordinates, class);
            let arrival = cursor.at + Duration::minutes(hop.minutes);
            timeline.push(
                SegmentKind::Travel(TravelSegment {
                    from_point: cursor.point.unwrap_or(0),
                    to_point: 0,
                    distance_km: round_km(hop.distance_km),
                    travel_minutes: hop.minutes,
                    class,
                }),
                cursor.at,
                arrival,
            );
            cursor.at = arrival;
            cursor.position = leg.to.coordinates;
            cursor.place = destination;
            cursor.point = None;
        }

        match ctx.closing {
            LegClosing::Overnight => {
                timeline.marker(SegmentKind::HotelArrival, cursor.at);
                if self.settings.parking_minutes > 0 {
                    let end = cursor.at + Duration::minutes(self.settings.parking_minutes);
                    timeline.push(SegmentKind::Parking, cursor.at, end);
                    cursor.at = end;
                }
            }
            LegClosing::Checkout => timeline.marker(SegmentKind::Checkout, cursor.at),
            LegClosing::Continuation => {}
        }

        let day_end = leg.day_end_at();
        if cursor.at > day_end {
            let minutes_over = (cursor.at - day_end).num_minutes();
            debug!("Leg {}: closing transfer ends {} min after day end", leg.id, minutes_over);
            vec![LegNotice::TransferOverrun { minutes_over }]
        } else {
            vec![]
        }
    }
}

fn commit(timeline: &mut Timeline, cursor: &mut Cursor, candidate: &Candidate, placement: Placement) {
    timeline.push(
        SegmentKind::Travel(TravelSegment {
            from_point: cursor.point.unwrap_or(0),
            to_point: candidate.point_id,
            distance_km: round_km(placement.hop.distance_km),
            travel_minutes: placement.hop.minutes,
            class: placement.class,
        }),
        cursor.at,
        placement.arrival,
    );
    timeline.push(
        SegmentKind::Visit(VisitSegment {
            point_id: candidate.point_id,
        }),
        placement.arrival,
        placement.departure,
    );

    cursor.at = placement.departure;
    cursor.position = candidate.coordinates;
    cursor.place = candidate.place.clone();
    cursor.point = Some(candidate.point_id);
}

// ===========================================================================
// Tests
// ===========================================================================
