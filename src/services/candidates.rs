//! Candidate points per location and leg
//!
//! A leg draws from three pools, consumed in this order:
//! favored points at the origin, favored points at the destination, then
//! filler (tier 0) points at the destination. Filler points at the origin are
//! never offered.

use std::collections::BTreeMap;

use crate::services::catalog::CatalogSnapshot;
use crate::services::geo::haversine_distance;
use crate::types::{normalize_place, Coordinates, Leg, PointId, PointOfInterest};

/// A point offered to the timeline builder for one place
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub point_id: PointId,
    pub priority: i32,
    /// Normalized place the point is visited as part of
    pub place: String,
    pub coordinates: Coordinates,
    pub visit_minutes: i64,
}

impl Candidate {
    pub fn from_point(point: &PointOfInterest, place: &str) -> Self {
        Self {
            point_id: point.id,
            priority: point.priority,
            place: normalize_place(place),
            coordinates: point.coordinates,
            visit_minutes: point.visit_duration_minutes,
        }
    }

    /// Lower is preferred: tier 1, 2, ... and filler last
    fn rank(&self) -> i32 {
        if self.priority > 0 {
            self.priority
        } else {
            i32::MAX
        }
    }
}

/// Points at one place split by tier, each ordered by (priority, id)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorityBuckets {
    pub favored: Vec<Candidate>,
    pub filler: Vec<Candidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    SourceFavored,
    DestinationFavored,
    DestinationFiller,
}

impl Phase {
    pub const ALL: [Phase; 3] = [
        Phase::SourceFavored,
        Phase::DestinationFavored,
        Phase::DestinationFiller,
    ];
}

/// Candidate pools of one leg
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegCandidates {
    pub source_favored: Vec<Candidate>,
    pub destination_favored: Vec<Candidate>,
    pub destination_filler: Vec<Candidate>,
}

impl LegCandidates {
    pub fn pool(&self, phase: Phase) -> &[Candidate] {
        match phase {
            Phase::SourceFavored => &self.source_favored,
            Phase::DestinationFavored => &self.destination_favored,
            Phase::DestinationFiller => &self.destination_filler,
        }
    }

    fn pool_mut(&mut self, phase: Phase) -> &mut Vec<Candidate> {
        match phase {
            Phase::SourceFavored => &mut self.source_favored,
            Phase::DestinationFavored => &mut self.destination_favored,
            Phase::DestinationFiller => &mut self.destination_filler,
        }
    }

    pub fn contains(&self, point_id: PointId) -> bool {
        Phase::ALL
            .iter()
            .any(|p| self.pool(*p).iter().any(|c| c.point_id == point_id))
    }

    pub fn len(&self) -> usize {
        Phase::ALL.iter().map(|p| self.pool(*p).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add one extra point to a pool. Returns false if it was already offered.
    pub fn inject(&mut self, candidate: Candidate, phase: Phase) -> bool {
        if self.contains(candidate.point_id) {
            return false;
        }
        let pool = self.pool_mut(phase);
        pool.push(candidate);
        pool.sort_by_key(|c| (c.rank(), c.point_id));
        true
    }

    /// Pool a point joins when added by hand to `leg`
    pub fn phase_for(point: &PointOfInterest, leg: &Leg) -> Phase {
        if point.belongs_to(&leg.from.name) {
            Phase::SourceFavored
        } else if point.is_favored() {
            Phase::DestinationFavored
        } else {
            Phase::DestinationFiller
        }
    }

    /// Place a hand-added point is visited as part of: the leg end it is
    /// tagged with, otherwise its own first tag
    pub fn place_for<'p>(point: &'p PointOfInterest, leg: &'p Leg) -> &'p str {
        if point.belongs_to(&leg.from.name) {
            &leg.from.name
        } else if point.belongs_to(&leg.to.name) {
            &leg.to.name
        } else {
            point.locations.first().map(String::as_str).unwrap_or(point.name.as_str())
        }
    }
}

/// Location-tag index over a catalog snapshot
pub struct PointCandidateProvider<'a> {
    snapshot: &'a CatalogSnapshot,
    by_place: BTreeMap<String, Vec<PointId>>,
}

impl<'a> PointCandidateProvider<'a> {
    pub fn new(snapshot: &'a CatalogSnapshot) -> Self {
        let mut by_place: BTreeMap<String, Vec<PointId>> = BTreeMap::new();
        for point in snapshot.points() {
            for place in &point.locations {
                by_place.entry(place.clone()).or_default().push(point.id);
            }
        }
        Self { snapshot, by_place }
    }

    /// Points tagged with `place`, split by tier
    pub fn points_at(&self, place: &str) -> PriorityBuckets {
        let place = normalize_place(place);
        let mut buckets = PriorityBuckets::default();

        let ids = match self.by_place.get(&place) {
            Some(ids) => ids,
            None => return buckets,
        };
        for id in ids {
            if let Some(point) = self.snapshot.point(*id) {
                let candidate = Candidate::from_point(point, &place);
                if point.is_favored() {
                    buckets.favored.push(candidate);
                } else {
                    buckets.filler.push(candidate);
                }
            }
        }
        buckets.favored.sort_by_key(|c| (c.priority, c.point_id));
        buckets.filler.sort_by_key(|c| c.point_id);
        buckets
    }

    /// Candidate pools for a leg; empty for a direct leg
    pub fn for_leg(&self, leg: &Leg) -> LegCandidates {
        if leg.direct {
            return LegCandidates::default();
        }

        let source = self.points_at(&leg.from.name);
        let destination = self.points_at(&leg.to.name);

        // Only favored points are visited on the way out of the origin
        let source_favored = source.favored;
        let seen = |c: &Candidate| source_favored.iter().any(|s| s.point_id == c.point_id);
        let destination_favored: Vec<Candidate> =
            destination.favored.into_iter().filter(|c| !seen(c)).collect();
        let destination_filler: Vec<Candidate> =
            destination.filler.into_iter().filter(|c| !seen(c)).collect();

        LegCandidates {
            source_favored,
            destination_favored,
            destination_filler,
        }
    }
}

/// Index of the preferred next candidate seen from `from`:
/// lowest priority tier, then nearest, then lowest id.
pub fn next_nearest(pool: &[Candidate], from: &Coordinates) -> Option<usize> {
    pool.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.rank()
                .cmp(&b.rank())
                .then_with(|| {
                    haversine_distance(from, &a.coordinates)
                        .total_cmp(&haversine_distance(from, &b.coordinates))
                })
                .then_with(|| a.point_id.cmp(&b.point_id))
        })
        .map(|(idx, _)| idx)
}
