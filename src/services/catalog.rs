//! Read-only catalog snapshot for one scheduling run
//!
//! Points and operating windows are loaded fresh per request and frozen here.
//! Malformed points are dropped with a warning instead of failing the build.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::services::opening_hours::OperatingWindowCatalog;
use crate::services::settings::MissingWindowPolicy;
use crate::types::{parse_location_tags, Coordinates, OperatingWindowRow, PointId, PointOfInterest, PointRow};

/// Why a stored point cannot be scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    MissingCoordinates,
    InvalidCoordinates,
    MissingDuration,
}

#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    points: BTreeMap<PointId, PointOfInterest>,
    excluded: BTreeMap<PointId, ExclusionReason>,
    windows: OperatingWindowCatalog,
}

impl CatalogSnapshot {
    pub fn from_rows(
        point_rows: &[PointRow],
        window_rows: &[OperatingWindowRow],
        missing: MissingWindowPolicy,
    ) -> Self {
        let mut points = BTreeMap::new();
        let mut excluded = BTreeMap::new();

        for row in point_rows {
            if !row.is_active || row.is_deleted {
                debug!("Skipping inactive point {} ({})", row.id, row.name);
                continue;
            }
            match validate_point(row) {
                Ok(point) => {
                    points.insert(point.id, point);
                }
                Err(reason) => {
                    warn!("Excluding point {} ({}) from scheduling: {:?}", row.id, row.name, reason);
                    excluded.insert(row.id, reason);
                }
            }
        }

        Self {
            points,
            excluded,
            windows: OperatingWindowCatalog::from_rows(window_rows, missing),
        }
    }

    pub fn point(&self, id: PointId) -> Option<&PointOfInterest> {
        self.points.get(&id)
    }

    /// Points in id order
    pub fn points(&self) -> impl Iterator<Item = &PointOfInterest> {
        self.points.values()
    }

    pub fn exclusion(&self, id: PointId) -> Option<ExclusionReason> {
        self.excluded.get(&id).copied()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    pub fn windows(&self) -> &OperatingWindowCatalog {
        &self.windows
    }
}

fn validate_point(row: &PointRow) -> Result<PointOfInterest, ExclusionReason> {
    let (lat, lng) = match (row.lat, row.lng) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => return Err(ExclusionReason::MissingCoordinates),
    };
    if !lat.is_finite() || !lng.is_finite() || lat.abs() > 90.0 || lng.abs() > 180.0 {
        return Err(ExclusionReason::InvalidCoordinates);
    }
    // 0,0 is what the old import wrote for "unknown"
    if lat == 0.0 && lng == 0.0 {
        return Err(ExclusionReason::MissingCoordinates);
    }
    let duration = match row.visit_duration_minutes {
        Some(d) if d > 0 => d as i64,
        _ => return Err(ExclusionReason::MissingDuration),
    };
    if row.priority < 0 {
        warn!("Point {} has negative priority {}, treating as filler", row.id, row.priority);
    }

    Ok(PointOfInterest {
        id: row.id,
        name: row.name.clone(),
        coordinates: Coordinates { lat, lng },
        visit_duration_minutes: duration,
        priority: row.priority.max(0),
        locations: parse_location_tags(&row.location_tags),
    })
}
