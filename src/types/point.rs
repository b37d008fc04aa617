//! Point-of-interest catalog types

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Point of interest identifier. `0` is reserved for "no point" in stored segments.
pub type PointId = i64;

/// GPS coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A canonical place (city/town) a leg starts or ends at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    pub coordinates: Coordinates,
}

/// Catalog row as stored. Coordinates and duration are nullable because the
/// back office lets agents save half-filled points.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PointRow {
    pub id: PointId,
    pub name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub visit_duration_minutes: Option<i32>,
    #[serde(default)]
    pub priority: i32,
    /// Pipe-delimited place names, e.g. `"Madurai|Alagar Koil"`
    #[serde(default)]
    pub location_tags: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

fn default_true() -> bool {
    true
}

/// A validated point, immutable for the duration of a scheduling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointOfInterest {
    pub id: PointId,
    pub name: String,
    pub coordinates: Coordinates,
    pub visit_duration_minutes: i64,
    pub priority: i32,
    /// Normalized place names (see [`normalize_place`])
    pub locations: Vec<String>,
}

impl PointOfInterest {
    pub fn is_favored(&self) -> bool {
        self.priority > 0
    }

    pub fn belongs_to(&self, place: &str) -> bool {
        let place = normalize_place(place);
        self.locations.iter().any(|l| *l == place)
    }
}

/// Operating window row for one point and weekday
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OperatingWindowRow {
    pub point_id: PointId,
    /// 0 = Monday .. 6 = Sunday
    pub weekday: i16,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub is_always_open: bool,
}

/// Canonical form of a place name used for tag matching
pub fn normalize_place(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Split a pipe-delimited tag string into normalized place names
pub fn parse_location_tags(tags: &str) -> Vec<String> {
    let mut places: Vec<String> = tags
        .split('|')
        .map(normalize_place)
        .filter(|p| !p.is_empty())
        .collect();
    places.sort();
    places.dedup();
    places
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_tags_trims_and_dedups() {
        let tags = parse_location_tags(" Madurai |madurai||Rameswaram ");
        assert_eq!(tags, vec!["madurai".to_string(), "rameswaram".to_string()]);
    }

    #[test]
    fn test_parse_location_tags_empty() {
        assert!(parse_location_tags("").is_empty());
        assert!(parse_location_tags("| |").is_empty());
    }

    #[test]
    fn test_point_row_defaults_from_json() {
        let row: PointRow = serde_json::from_str(
            r#"{"id": 7, "name": "Fort", "lat": 10.0, "lng": 78.0, "visitDurationMinutes": 45}"#,
        )
        .unwrap();
        assert!(row.is_active);
        assert!(!row.is_deleted);
        assert_eq!(row.priority, 0);
        assert_eq!(row.location_tags, "");
    }
}
