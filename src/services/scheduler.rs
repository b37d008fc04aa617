//! Trip-level orchestration of the leg timeline builder
//!
//! Legs are built strictly in order. Each leg's clock resets to its own day
//! start, but its first hop departs from wherever the previous leg left the
//! traveller (the last visited point, or the previous destination).

use std::collections::BTreeSet;

use tracing::info;

use crate::error::SchedulerError;
use crate::services::candidates::{LegCandidates, PointCandidateProvider};
use crate::services::catalog::CatalogSnapshot;
use crate::services::geo::{GeoDistanceEstimator, TravelModel};
use crate::services::settings::ScheduleSettings;
use crate::services::timeline::{LegClosing, LegContext, LegOpening, LegTimelineBuilder};
use crate::types::{LegPlan, PlanningInput, TripDescriptor, TripPlan};

pub struct ItineraryScheduler<'a, T: TravelModel> {
    snapshot: &'a CatalogSnapshot,
    travel: &'a T,
    settings: &'a ScheduleSettings,
    provider: PointCandidateProvider<'a>,
}

impl<'a, T: TravelModel> ItineraryScheduler<'a, T> {
    pub fn new(snapshot: &'a CatalogSnapshot, travel: &'a T, settings: &'a ScheduleSettings) -> Self {
        Self {
            snapshot,
            travel,
            settings,
            provider: PointCandidateProvider::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        self.snapshot
    }

    pub fn provider(&self) -> &PointCandidateProvider<'a> {
        &self.provider
    }

    /// Build the whole trip
    pub fn build_trip(&self, trip: &TripDescriptor) -> Result<TripPlan, SchedulerError> {
        validate_trip(trip)?;

        let mut legs: Vec<LegPlan> = Vec::with_capacity(trip.legs.len());
        for index in 0..trip.legs.len() {
            let ctx = self.leg_context(trip, index, legs.last());
            let candidates = self.provider.for_leg(ctx.leg);
            legs.push(self.build_leg(&ctx, &candidates));
        }

        let plan = TripPlan {
            trip_id: trip.id,
            legs,
        };
        info!(
            "Trip {} scheduled: {} legs, {} visits",
            trip.id,
            plan.legs.len(),
            plan.total_visits()
        );
        Ok(plan)
    }

    pub fn build_leg(&self, ctx: &LegContext<'_>, candidates: &LegCandidates) -> LegPlan {
        LegTimelineBuilder::new(self.snapshot.windows(), self.travel, self.settings).build(ctx, candidates)
    }

    /// Starting context for leg `index`, seeded from the plan of the leg before it
    pub fn leg_context<'l>(
        &self,
        trip: &'l TripDescriptor,
        index: usize,
        previous: Option<&LegPlan>,
    ) -> LegContext<'l> {
        let leg = &trip.legs[index];
        let prev_leg = index.checked_sub(1).and_then(|i| trip.legs.get(i));
        let next_leg = trip.legs.get(index + 1);
        let same_day_as_prev = prev_leg.is_some_and(|p| p.date == leg.date);

        let opening = match prev_leg {
            None => LegOpening::TripStart,
            Some(_) if same_day_as_prev => LegOpening::Continuation,
            Some(_) => LegOpening::HotelDeparture,
        };
        let closing = match next_leg {
            None => LegClosing::Checkout,
            Some(next) if next.date == leg.date => LegClosing::Continuation,
            Some(_) => LegClosing::Overnight,
        };

        let mut ctx = LegContext::at_origin(leg, opening, closing);
        if let Some(prev) = previous {
            ctx.start_place = prev.end_state.place.clone();
            ctx.start_position = prev.end_state.coordinates;
            ctx.start_point = prev.end_state.last_point;
            if same_day_as_prev {
                ctx.start_at = ctx.start_at.max(prev.end_state.at);
            }
        }
        ctx
    }
}

/// Build a plan from a self-contained planning document with the default
/// travel model
pub fn plan_from_input(input: &PlanningInput, settings: &ScheduleSettings) -> Result<TripPlan, SchedulerError> {
    let snapshot = CatalogSnapshot::from_rows(&input.points, &input.windows, settings.missing_windows);
    let estimator = GeoDistanceEstimator::new(settings.estimator);
    ItineraryScheduler::new(&snapshot, &estimator, settings).build_trip(&input.trip)
}

/// Reject trips the builder cannot walk: inverted days, dates going
/// backwards, repeated legs
pub fn validate_trip(trip: &TripDescriptor) -> Result<(), SchedulerError> {
    let mut seen = BTreeSet::new();
    let mut previous_date = None;

    for leg in &trip.legs {
        if !seen.insert(leg.id) {
            return Err(SchedulerError::DuplicateLeg(leg.id));
        }
        if leg.day_end <= leg.day_start {
            return Err(SchedulerError::InvalidDayWindow {
                leg_id: leg.id,
                start: leg.day_start,
                end: leg.day_end,
            });
        }
        if previous_date.is_some_and(|d| leg.date < d) {
            return Err(SchedulerError::LegsOutOfOrder {
                leg_id: leg.id,
                date: leg.date,
            });
        }
        previous_date = Some(leg.date);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::settings::MissingWindowPolicy;
    use crate::services::timeline::tests::{assert_contiguous, friday, hm, point_row, window_row, FixedTravel};
    use crate::types::{Coordinates, Leg, Location, OperatingWindowRow, PointId, PointRow, SegmentKind, SkipReason};
    use chrono::{Datelike, Duration, NaiveDate};
    use proptest::prelude::*;

    pub(crate) fn city(name: &str, lat: f64, lng: f64) -> Location {
        Location {
            name: name.to_string(),
            coordinates: Coordinates { lat, lng },
        }
    }

    pub(crate) fn madurai() -> Location {
        city("Madurai", 9.92, 78.12)
    }

    pub(crate) fn rameswaram() -> Location {
        city("Rameswaram", 9.29, 79.31)
    }

    pub(crate) fn kanyakumari() -> Location {
        city("Kanyakumari", 8.08, 77.54)
    }

    pub(crate) fn day_leg(id: i64, from: Location, to: Location, date: NaiveDate) -> Leg {
        Leg {
            id,
            order: id as i32,
            from,
            to,
            date,
            day_start: hm(8, 0),
            day_end: hm(20, 0),
            direct: false,
        }
    }

    /// Madurai -> Rameswaram -> Kanyakumari over three days
    pub(crate) fn three_day_trip() -> TripDescriptor {
        let d0 = friday();
        TripDescriptor {
            id: 1,
            legs: vec![
                day_leg(1, madurai(), rameswaram(), d0),
                day_leg(2, rameswaram(), rameswaram(), d0 + Duration::days(1)),
                day_leg(3, rameswaram(), kanyakumari(), d0 + Duration::days(2)),
            ],
        }
    }

    pub(crate) fn tamil_nadu_points() -> Vec<PointRow> {
        vec![
            point_row(1, 1, "Madurai", 9.9195, 78.1193, 90),
            point_row(2, 2, "Madurai", 9.9327, 78.1283, 60),
            point_row(3, 0, "Madurai", 9.9177, 78.1380, 45),
            point_row(4, 1, "Rameswaram", 9.2881, 79.3174, 90),
            point_row(5, 0, "Rameswaram", 9.1750, 79.4180, 120),
            point_row(6, 1, "Rameswaram", 9.2530, 79.2130, 60),
            point_row(7, 0, "Kanyakumari", 8.0780, 77.5530, 60),
            point_row(8, 1, "Kanyakumari", 8.0860, 77.5385, 90),
        ]
    }

    fn settings() -> ScheduleSettings {
        ScheduleSettings {
            missing_windows: MissingWindowPolicy::AlwaysOpen,
            ..ScheduleSettings::default()
        }
    }

    #[test]
    fn test_three_day_trip_markers() {
        let snapshot = CatalogSnapshot::from_rows(&tamil_nadu_points(), &[], MissingWindowPolicy::AlwaysOpen);
        let estimator = GeoDistanceEstimator::default();
        let settings = settings();
        let scheduler = ItineraryScheduler::new(&snapshot, &estimator, &settings);

        let plan = scheduler.build_trip(&three_day_trip()).unwrap();
        assert_eq!(plan.legs.len(), 3);

        let first = |l: &LegPlan| l.segments.first().map(|s| s.kind.as_str());
        let last = |l: &LegPlan| l.segments.last().map(|s| s.kind.as_str());
        assert_eq!(first(&plan.legs[0]), Some("trip_start"));
        assert_eq!(first(&plan.legs[1]), Some("hotel_departure"));
        assert_eq!(first(&plan.legs[2]), Some("hotel_departure"));
        assert_eq!(last(&plan.legs[0]), Some("parking"));
        assert_eq!(last(&plan.legs[2]), Some("checkout"));
        assert!(plan.legs[0].segments.iter().any(|s| s.kind == SegmentKind::HotelArrival));

        for leg in &plan.legs {
            assert_contiguous(leg);
        }
        // Day one: tier-0 Madurai point 3 stays out, Rameswaram filler may join
        assert!(!plan.legs[0].visits_point(3));
    }

    #[test]
    fn test_next_day_departs_from_last_point() {
        let snapshot = CatalogSnapshot::from_rows(&tamil_nadu_points(), &[], MissingWindowPolicy::AlwaysOpen);
        let travel = FixedTravel { minutes: 30 };
        let settings = settings();
        let scheduler = ItineraryScheduler::new(&snapshot, &travel, &settings);

        let plan = scheduler.build_trip(&three_day_trip()).unwrap();
        let day_one = &plan.legs[0];
        let last_point = day_one.end_state.last_point.expect("day one ends at a Rameswaram point");

        let first_travel = plan.legs[1]
            .segments
            .iter()
            .find_map(|s| match &s.kind {
                SegmentKind::Travel(t) => Some(t.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(first_travel.from_point, last_point);

        // Clock resets to the day's own start
        assert_eq!(plan.legs[1].segments[0].start, plan.legs[1].date.and_time(hm(8, 0)));
    }

    #[test]
    fn test_same_day_legs_continue_clock() {
        let snapshot = CatalogSnapshot::from_rows(&tamil_nadu_points(), &[], MissingWindowPolicy::AlwaysOpen);
        let travel = FixedTravel { minutes: 30 };
        let settings = settings();
        let scheduler = ItineraryScheduler::new(&snapshot, &travel, &settings);

        let trip = TripDescriptor {
            id: 2,
            legs: vec![
                day_leg(1, madurai(), madurai(), friday()),
                day_leg(2, madurai(), rameswaram(), friday()),
            ],
        };
        let plan = scheduler.build_trip(&trip).unwrap();

        // No hotel between the two legs
        assert!(plan.legs[0].segments.iter().all(|s| s.kind != SegmentKind::HotelArrival));
        assert!(plan.legs[1].segments.iter().all(|s| s.kind != SegmentKind::HotelDeparture));
        assert_eq!(
            plan.legs[1].segments.first().map(|s| s.start),
            Some(plan.legs[0].end_state.at)
        );
    }

    #[test]
    fn test_direct_leg_in_trip() {
        let snapshot = CatalogSnapshot::from_rows(&tamil_nadu_points(), &[], MissingWindowPolicy::AlwaysOpen);
        let estimator = GeoDistanceEstimator::default();
        let settings = settings();
        let scheduler = ItineraryScheduler::new(&snapshot, &estimator, &settings);

        let mut trip = three_day_trip();
        trip.legs[2].direct = true;
        let plan = scheduler.build_trip(&trip).unwrap();

        let leg = &plan.legs[2];
        assert_eq!(leg.visits().count(), 0);
        assert_eq!(leg.segments.iter().filter(|s| s.kind.as_str() == "travel").count(), 1);
        assert!(leg.skipped.is_empty());
    }

    #[test]
    fn test_rejects_inverted_day() {
        let snapshot = CatalogSnapshot::from_rows(&[], &[], MissingWindowPolicy::Closed);
        let estimator = GeoDistanceEstimator::default();
        let settings = ScheduleSettings::default();
        let scheduler = ItineraryScheduler::new(&snapshot, &estimator, &settings);

        let mut trip = three_day_trip();
        trip.legs[1].day_end = hm(7, 0);
        assert!(matches!(
            scheduler.build_trip(&trip),
            Err(SchedulerError::InvalidDayWindow { leg_id: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_dates_going_back() {
        let mut trip = three_day_trip();
        trip.legs[2].date = friday() - Duration::days(1);
        assert!(matches!(validate_trip(&trip), Err(SchedulerError::LegsOutOfOrder { leg_id: 3, .. })));

        let mut trip = three_day_trip();
        trip.legs[2].id = 1;
        assert_eq!(validate_trip(&trip), Err(SchedulerError::DuplicateLeg(1)));
    }

    #[test]
    fn test_plan_from_input_document() {
        let json = r#"{
            "trip": {
                "id": 5,
                "legs": [{
                    "id": 1, "order": 1,
                    "from": {"name": "Madurai", "coordinates": {"lat": 9.92, "lng": 78.12}},
                    "to": {"name": "Madurai", "coordinates": {"lat": 9.92, "lng": 78.12}},
                    "date": "2026-03-06", "dayStart": "08:00:00", "dayEnd": "20:00:00"
                }]
            },
            "points": [
                {"id": 1, "name": "Meenakshi Temple", "lat": 9.9195, "lng": 78.1193,
                 "visitDurationMinutes": 90, "priority": 1, "locationTags": "Madurai"}
            ],
            "windows": [
                {"pointId": 1, "weekday": 4, "startTime": "05:00:00", "endTime": "12:30:00"}
            ]
        }"#;
        let input: PlanningInput = serde_json::from_str(json).unwrap();
        let plan = plan_from_input(&input, &ScheduleSettings::default()).unwrap();

        assert_eq!(plan.trip_id, 5);
        assert!(plan.legs[0].visits_point(1));
        assert_eq!(plan.legs[0].segments.last().map(|s| s.kind.as_str()), Some("checkout"));
    }

    #[test]
    fn test_empty_trip_is_empty_plan() {
        let snapshot = CatalogSnapshot::from_rows(&[], &[], MissingWindowPolicy::Closed);
        let estimator = GeoDistanceEstimator::default();
        let settings = ScheduleSettings::default();
        let scheduler = ItineraryScheduler::new(&snapshot, &estimator, &settings);

        let plan = scheduler.build_trip(&TripDescriptor { id: 9, legs: vec![] }).unwrap();
        assert!(plan.legs.is_empty());
    }

    #[test]
    fn test_weekday_windows_follow_calendar() {
        // Point 4 only opens on Sundays; day two of the trip is a Saturday
        let snapshot = CatalogSnapshot::from_rows(
            &tamil_nadu_points(),
            &[window_row(4, 6, hm(6, 0), hm(21, 0))],
            MissingWindowPolicy::Closed,
        );
        let estimator = GeoDistanceEstimator::default();
        let settings = settings();
        let scheduler = ItineraryScheduler::new(&snapshot, &estimator, &settings);

        let plan = scheduler.build_trip(&three_day_trip()).unwrap();
        assert_eq!(plan.legs[1].date.weekday(), chrono::Weekday::Sat);
        assert!(!plan.legs[1].visits_point(4));
        assert!(matches!(
            plan.legs[1].skip_reason(4),
            Some(SkipReason::OutsideOperatingWindow { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Properties over generated catalogs
    // -----------------------------------------------------------------------

    fn arb_points() -> impl Strategy<Value = Vec<PointRow>> {
        prop::collection::vec(
            (0usize..3, -0.08f64..0.08, -0.08f64..0.08, 15i32..180, 0i32..4),
            0..14,
        )
        .prop_map(|specs| {
            let cities = [madurai(), rameswaram(), kanyakumari()];
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (c, dlat, dlng, minutes, priority))| {
                    let home = &cities[c];
                    point_row(
                        i as PointId + 1,
                        priority,
                        &home.name,
                        home.coordinates.lat + dlat,
                        home.coordinates.lng + dlng,
                        minutes,
                    )
                })
                .collect()
        })
    }

    fn arb_windows() -> impl Strategy<Value = Vec<OperatingWindowRow>> {
        prop::collection::vec((1i64..15, 0i16..7, 6u32..14, 1u32..9), 0..20).prop_map(|specs| {
            specs
                .into_iter()
                .map(|(point_id, weekday, open_h, hours)| {
                    window_row(point_id, weekday, hm(open_h, 0), hm((open_h + hours).min(23), 0))
                })
                .collect()
        })
    }

    fn arb_settings() -> impl Strategy<Value = ScheduleSettings> {
        (any::<bool>(), any::<bool>()).prop_map(|(retry, open)| ScheduleSettings {
            selection: if retry {
                crate::services::settings::SelectionStrategy::DeferRetry
            } else {
                crate::services::settings::SelectionStrategy::Greedy
            },
            missing_windows: if open {
                MissingWindowPolicy::AlwaysOpen
            } else {
                MissingWindowPolicy::Closed
            },
            ..ScheduleSettings::default()
        })
    }

    proptest! {
        #[test]
        fn prop_schedule_invariants(points in arb_points(), windows in arb_windows(), settings in arb_settings()) {
            let snapshot = CatalogSnapshot::from_rows(&points, &windows, settings.missing_windows);
            let estimator = GeoDistanceEstimator::default();
            let scheduler = ItineraryScheduler::new(&snapshot, &estimator, &settings);
            let trip = three_day_trip();

            let plan = scheduler.build_trip(&trip).unwrap();
            let again = scheduler.build_trip(&trip).unwrap();
            prop_assert_eq!(
                serde_json::to_string(&plan).unwrap(),
                serde_json::to_string(&again).unwrap()
            );

            for (leg, built) in trip.legs.iter().zip(&plan.legs) {
                let mut seen = BTreeSet::new();
                for pair in built.segments.windows(2) {
                    prop_assert_eq!(pair[0].end, pair[1].start);
                }
                for (segment, point_id) in built.visits() {
                    prop_assert!(seen.insert(point_id), "point {} visited twice", point_id);
                    let weekday = segment.start.weekday();
                    prop_assert!(snapshot.windows().is_open(
                        point_id,
                        weekday,
                        segment.start.time(),
                        segment.end.time()
                    ));
                }
                if built.notices.is_empty() {
                    for segment in &built.segments {
                        prop_assert!(segment.end <= leg.day_end_at());
                    }
                }
                for segment in &built.segments {
                    if matches!(segment.kind, SegmentKind::Visit(_) | SegmentKind::Refreshment) {
                        prop_assert!(segment.end <= leg.day_end_at());
                    }
                }
            }
        }
    }
}
