//! Trip descriptor queries

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;

use crate::defaults::{default_day_end, default_day_start};
use crate::types::{Coordinates, Leg, LegId, Location, TripDescriptor, TripId};

#[derive(Debug, Clone, sqlx::FromRow)]
struct LegRow {
    id: LegId,
    leg_order: i32,
    from_name: String,
    from_lat: f64,
    from_lng: f64,
    to_name: String,
    to_lat: f64,
    to_lng: f64,
    leg_date: NaiveDate,
    day_start: Option<NaiveTime>,
    day_end: Option<NaiveTime>,
    is_direct: bool,
}

impl From<LegRow> for Leg {
    fn from(row: LegRow) -> Self {
        Leg {
            id: row.id,
            order: row.leg_order,
            from: Location {
                name: row.from_name,
                coordinates: Coordinates {
                    lat: row.from_lat,
                    lng: row.from_lng,
                },
            },
            to: Location {
                name: row.to_name,
                coordinates: Coordinates {
                    lat: row.to_lat,
                    lng: row.to_lng,
                },
            },
            date: row.leg_date,
            day_start: row.day_start.unwrap_or_else(default_day_start),
            day_end: row.day_end.unwrap_or_else(default_day_end),
            direct: row.is_direct,
        }
    }
}

/// Load a trip with its legs in order, `None` when the trip does not exist
pub async fn load_trip(pool: &PgPool, trip_id: TripId) -> Result<Option<TripDescriptor>> {
    let exists: Option<(TripId,)> = sqlx::query_as("SELECT id FROM itinerary_trips WHERE id = $1")
        .bind(trip_id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up trip")?;
    if exists.is_none() {
        return Ok(None);
    }

    let rows = sqlx::query_as::<_, LegRow>(
        r#"
        SELECT
            id, leg_order,
            from_name, from_lat, from_lng,
            to_name, to_lat, to_lng,
            leg_date, day_start, day_end, is_direct
        FROM itinerary_legs
        WHERE trip_id = $1
        ORDER BY leg_order, id
        "#,
    )
    .bind(trip_id)
    .fetch_all(pool)
    .await
    .context("Failed to load trip legs")?;

    Ok(Some(TripDescriptor {
        id: trip_id,
        legs: rows.into_iter().map(Leg::from).collect(),
    }))
}
