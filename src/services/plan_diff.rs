//! Leg and plan comparison
//!
//! Used by the patch preview to describe what adding a point changes, and by
//! the `diff` command to compare two stored or offline plans.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{LegDiff, LegId, LegPlan, PointId, RetimedVisit, TripPlan};

/// Compare two versions of the same leg
pub fn diff_leg(before: &LegPlan, after: &LegPlan) -> LegDiff {
    let before_visits: BTreeMap<PointId, _> = before.visits().map(|(s, id)| (id, s.start)).collect();
    let after_visits: BTreeMap<PointId, _> = after.visits().map(|(s, id)| (id, s.start)).collect();

    let added_visits = after
        .visits()
        .map(|(_, id)| id)
        .filter(|id| !before_visits.contains_key(id))
        .collect();
    let removed_visits = before
        .visits()
        .map(|(_, id)| id)
        .filter(|id| !after_visits.contains_key(id))
        .collect();
    let retimed_visits = before
        .visits()
        .filter_map(|(segment, id)| {
            let after_start = *after_visits.get(&id)?;
            (after_start != segment.start).then_some(RetimedVisit {
                point_id: id,
                before_start: segment.start,
                after_start,
            })
        })
        .collect();

    LegDiff {
        added_visits,
        removed_visits,
        retimed_visits,
        segments_changed: before.segments != after.segments,
        end_state_changed: before.end_state != after.end_state,
    }
}

/// How one leg compares between two plans
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LegComparison {
    Same { leg_id: LegId },
    Changed { leg_id: LegId, diff: LegDiff },
    OnlyInFirst { leg_id: LegId },
    OnlyInSecond { leg_id: LegId },
}

impl LegComparison {
    pub fn is_same(&self) -> bool {
        matches!(self, LegComparison::Same { .. })
    }
}

/// Compare two plans leg by leg, in the first plan's leg order
pub fn diff_plans(a: &TripPlan, b: &TripPlan) -> Vec<LegComparison> {
    let mut out: Vec<LegComparison> = a
        .legs
        .iter()
        .map(|leg| match b.leg(leg.leg_id) {
            None => LegComparison::OnlyInFirst { leg_id: leg.leg_id },
            Some(other) => {
                let diff = diff_leg(leg, other);
                if diff.is_empty() {
                    LegComparison::Same { leg_id: leg.leg_id }
                } else {
                    LegComparison::Changed { leg_id: leg.leg_id, diff }
                }
            }
        })
        .collect();

    out.extend(
        b.legs
            .iter()
            .filter(|leg| a.leg(leg.leg_id).is_none())
            .map(|leg| LegComparison::OnlyInSecond { leg_id: leg.leg_id }),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::CatalogSnapshot;
    use crate::services::scheduler::tests::{tamil_nadu_points, three_day_trip};
    use crate::services::scheduler::ItineraryScheduler;
    use crate::services::settings::{MissingWindowPolicy, ScheduleSettings};
    use crate::services::timeline::tests::FixedTravel;

    fn plan_with(travel_minutes: i64) -> TripPlan {
        let snapshot = CatalogSnapshot::from_rows(&tamil_nadu_points(), &[], MissingWindowPolicy::AlwaysOpen);
        let travel = FixedTravel { minutes: travel_minutes };
        let settings = ScheduleSettings {
            missing_windows: MissingWindowPolicy::AlwaysOpen,
            ..ScheduleSettings::default()
        };
        ItineraryScheduler::new(&snapshot, &travel, &settings)
            .build_trip(&three_day_trip())
            .unwrap()
    }

    #[test]
    fn test_identical_plans_compare_same() {
        let plan = plan_with(30);
        let result = diff_plans(&plan, &plan.clone());
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(LegComparison::is_same));
    }

    #[test]
    fn test_slower_travel_retimes_visits() {
        let fast = plan_with(30);
        let slow = plan_with(45);
        let diff = diff_leg(&fast.legs[0], &slow.legs[0]);

        assert!(diff.segments_changed);
        // The first visit is the same point, reached 15 minutes later
        let first = &diff.retimed_visits[0];
        assert_eq!((first.after_start - first.before_start).num_minutes(), 15);
    }

    #[test]
    fn test_added_and_removed_visits() {
        let plan = plan_with(30);
        let mut trimmed = plan.legs[0].clone();
        let dropped = trimmed
            .segments
            .iter()
            .rposition(|s| s.kind.as_str() == "visit")
            .unwrap();
        let dropped_id = trimmed.segments.remove(dropped).kind.point_id();

        let diff = diff_leg(&plan.legs[0], &trimmed);
        assert_eq!(diff.removed_visits, vec![dropped_id]);
        assert!(diff.added_visits.is_empty());

        let diff = diff_leg(&trimmed, &plan.legs[0]);
        assert_eq!(diff.added_visits, vec![dropped_id]);
    }

    #[test]
    fn test_missing_legs_reported() {
        let plan = plan_with(30);
        let mut shorter = plan.clone();
        shorter.legs.pop();

        let result = diff_plans(&plan, &shorter);
        assert_eq!(result.last(), Some(&LegComparison::OnlyInFirst { leg_id: 3 }));

        let result = diff_plans(&shorter, &plan);
        assert_eq!(result.last(), Some(&LegComparison::OnlyInSecond { leg_id: 3 }));
    }
}
