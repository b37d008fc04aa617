//! Stored timeline queries
//!
//! A full rebuild and a single-leg patch both replace rows inside one
//! transaction that holds the trip row lock, so concurrent writers for the
//! same trip serialize instead of interleaving segments. A leg patch is only
//! written if the stored plan it was computed from is still current.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};

use crate::types::{
    Coordinates, LegEndState, LegId, LegNotice, LegPlan, PointId, SegmentKind, SkippedPoint, TimelineSegment,
    TravelClass, TravelSegment, TripId, TripPlan, VisitSegment,
};

/// One row of `itinerary_timeline_segments`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SegmentRow {
    pub leg_id: LegId,
    pub segment_order: i32,
    pub kind: String,
    pub point_id: PointId,
    pub from_point_id: PointId,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub distance_km: Option<f64>,
    pub travel_minutes: Option<i32>,
    pub travel_class: Option<String>,
}

impl SegmentRow {
    pub fn from_segment(segment: &TimelineSegment) -> Self {
        let mut row = SegmentRow {
            leg_id: segment.leg_id,
            segment_order: segment.order as i32,
            kind: segment.kind.as_str().to_string(),
            point_id: segment.kind.point_id(),
            from_point_id: 0,
            start_at: segment.start,
            end_at: segment.end,
            distance_km: None,
            travel_minutes: None,
            travel_class: None,
        };
        if let SegmentKind::Travel(travel) = &segment.kind {
            row.from_point_id = travel.from_point;
            row.distance_km = Some(travel.distance_km);
            row.travel_minutes = Some(travel.travel_minutes as i32);
            row.travel_class = Some(travel.class.as_str().to_string());
        }
        row
    }

    pub fn into_segment(self) -> Result<TimelineSegment> {
        let kind = match self.kind.as_str() {
            "trip_start" => SegmentKind::TripStart,
            "refreshment" => SegmentKind::Refreshment,
            "parking" => SegmentKind::Parking,
            "hotel_arrival" => SegmentKind::HotelArrival,
            "hotel_departure" => SegmentKind::HotelDeparture,
            "checkout" => SegmentKind::Checkout,
            "visit" => SegmentKind::Visit(VisitSegment {
                point_id: self.point_id,
            }),
            "travel" => {
                let class = self
                    .travel_class
                    .as_deref()
                    .and_then(TravelClass::parse)
                    .with_context(|| {
                        format!(
                            "Travel segment {} of leg {} has no valid travel class",
                            self.segment_order, self.leg_id
                        )
                    })?;
                SegmentKind::Travel(TravelSegment {
                    from_point: self.from_point_id,
                    to_point: self.point_id,
                    distance_km: self.distance_km.unwrap_or(0.0),
                    travel_minutes: self.travel_minutes.unwrap_or(0) as i64,
                    class,
                })
            }
            other => bail!("Unknown segment kind '{}' in leg {}", other, self.leg_id),
        };

        Ok(TimelineSegment {
            leg_id: self.leg_id,
            order: self.segment_order.max(0) as u32,
            kind,
            start: self.start_at,
            end: self.end_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct LegStateRow {
    leg_id: LegId,
    leg_date: NaiveDate,
    end_place: String,
    end_lat: f64,
    end_lng: f64,
    last_point_id: Option<PointId>,
    end_at: NaiveDateTime,
    skipped: Json<Vec<SkippedPoint>>,
    notices: Json<Vec<LegNotice>>,
}

/// Lock the trip row for the rest of the transaction
async fn lock_trip(conn: &mut PgConnection, trip_id: TripId) -> Result<()> {
    let locked: Option<(TripId,)> = sqlx::query_as("SELECT id FROM itinerary_trips WHERE id = $1 FOR UPDATE")
        .bind(trip_id)
        .fetch_optional(&mut *conn)
        .await?;
    if locked.is_none() {
        bail!("Trip {} not found", trip_id);
    }
    Ok(())
}

async fn insert_leg(conn: &mut PgConnection, trip_id: TripId, leg: &LegPlan) -> Result<()> {
    for segment in &leg.segments {
        let row = SegmentRow::from_segment(segment);
        sqlx::query(
            r#"
            INSERT INTO itinerary_timeline_segments (
                trip_id, leg_id, segment_order, kind, point_id, from_point_id,
                start_at, end_at, distance_km, travel_minutes, travel_class
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(trip_id)
        .bind(row.leg_id)
        .bind(row.segment_order)
        .bind(&row.kind)
        .bind(row.point_id)
        .bind(row.from_point_id)
        .bind(row.start_at)
        .bind(row.end_at)
        .bind(row.distance_km)
        .bind(row.travel_minutes)
        .bind(&row.travel_class)
        .execute(&mut *conn)
        .await?;
    }

    let state = &leg.end_state;
    sqlx::query(
        r#"
        INSERT INTO itinerary_leg_states (
            leg_id, trip_id, end_place, end_lat, end_lng, last_point_id, end_at, skipped, notices
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(leg.leg_id)
    .bind(trip_id)
    .bind(&state.place)
    .bind(state.coordinates.lat)
    .bind(state.coordinates.lng)
    .bind(state.last_point)
    .bind(state.at)
    .bind(Json(&leg.skipped))
    .bind(Json(&leg.notices))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Replace every stored segment of a trip with `plan`
pub async fn replace_trip_timeline(pool: &PgPool, plan: &TripPlan) -> Result<()> {
    let mut tx = pool.begin().await?;
    lock_trip(&mut *tx, plan.trip_id).await?;

    sqlx::query("DELETE FROM itinerary_timeline_segments WHERE trip_id = $1")
        .bind(plan.trip_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM itinerary_leg_states WHERE trip_id = $1")
        .bind(plan.trip_id)
        .execute(&mut *tx)
        .await?;

    for leg in &plan.legs {
        insert_leg(&mut *tx, plan.trip_id, leg)
            .await
            .with_context(|| format!("Failed to store leg {}", leg.leg_id))?;
    }

    sqlx::query("UPDATE itinerary_trips SET planned_at = NOW() WHERE id = $1")
        .bind(plan.trip_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!("Stored timeline of trip {} ({} legs)", plan.trip_id, plan.legs.len());
    Ok(())
}

/// Outcome of storing a patched leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegCommit {
    Stored,
    /// The stored plan changed after the patch was computed; nothing written
    Conflict,
}

/// True when `current` is still exactly the plan a patch was computed from
fn plan_unchanged(seen: &TripPlan, current: Option<&TripPlan>) -> bool {
    current == Some(seen)
}

/// Replace the stored segments of a single leg, provided the stored plan is
/// still `seen`. The check and the write happen under the trip row lock.
pub async fn commit_leg_timeline(pool: &PgPool, seen: &TripPlan, leg: &LegPlan) -> Result<LegCommit> {
    let trip_id = seen.trip_id;
    let mut tx = pool.begin().await?;
    lock_trip(&mut *tx, trip_id).await?;

    let current = fetch_trip_plan(&mut *tx, trip_id).await?;
    if !plan_unchanged(seen, current.as_ref()) {
        tx.rollback().await?;
        warn!("Timeline of trip {} changed while leg {} was patched", trip_id, leg.leg_id);
        return Ok(LegCommit::Conflict);
    }

    sqlx::query("DELETE FROM itinerary_timeline_segments WHERE leg_id = $1")
        .bind(leg.leg_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM itinerary_leg_states WHERE leg_id = $1")
        .bind(leg.leg_id)
        .execute(&mut *tx)
        .await?;
    insert_leg(&mut *tx, trip_id, leg).await?;

    sqlx::query("UPDATE itinerary_trips SET planned_at = NOW() WHERE id = $1")
        .bind(trip_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!("Stored timeline of leg {} in trip {}", leg.leg_id, trip_id);
    Ok(LegCommit::Stored)
}

/// Load the stored plan of a trip; legs without a stored state are left out
pub async fn load_trip_plan(pool: &PgPool, trip_id: TripId) -> Result<Option<TripPlan>> {
    let mut conn = pool.acquire().await?;
    fetch_trip_plan(&mut *conn, trip_id).await
}

async fn fetch_trip_plan(conn: &mut PgConnection, trip_id: TripId) -> Result<Option<TripPlan>> {
    let states = sqlx::query_as::<_, LegStateRow>(
        r#"
        SELECT
            s.leg_id, l.leg_date, s.end_place, s.end_lat, s.end_lng,
            s.last_point_id, s.end_at, s.skipped, s.notices
        FROM itinerary_leg_states s
        JOIN itinerary_legs l ON l.id = s.leg_id
        WHERE s.trip_id = $1
        ORDER BY l.leg_order, l.id
        "#,
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to load leg states")?;

    if states.is_empty() {
        return Ok(None);
    }

    let rows = sqlx::query_as::<_, SegmentRow>(
        r#"
        SELECT
            leg_id, segment_order, kind, point_id, from_point_id,
            start_at, end_at, distance_km, travel_minutes, travel_class
        FROM itinerary_timeline_segments
        WHERE trip_id = $1
        ORDER BY leg_id, segment_order
        "#,
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to load timeline segments")?;

    Ok(Some(assemble_plan(trip_id, states, rows)?))
}

fn assemble_plan(trip_id: TripId, states: Vec<LegStateRow>, rows: Vec<SegmentRow>) -> Result<TripPlan> {
    let mut legs: Vec<LegPlan> = states
        .into_iter()
        .map(|s| LegPlan {
            leg_id: s.leg_id,
            date: s.leg_date,
            segments: Vec::new(),
            skipped: s.skipped.0,
            end_state: LegEndState {
                place: s.end_place,
                coordinates: Coordinates {
                    lat: s.end_lat,
                    lng: s.end_lng,
                },
                last_point: s.last_point_id,
                at: s.end_at,
            },
            notices: s.notices.0,
        })
        .collect();

    for row in rows {
        let leg_id = row.leg_id;
        if let Some(leg) = legs.iter_mut().find(|l| l.leg_id == leg_id) {
            leg.segments.push(row.into_segment()?);
        }
    }
    for leg in &mut legs {
        leg.segments.sort_by_key(|s| s.order);
    }

    Ok(TripPlan { trip_id, legs })
}
