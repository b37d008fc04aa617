//! Itinerary timeline handlers

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::db::queries::timeline::LegCommit;
use crate::error::SchedulerError;
use crate::services::catalog::CatalogSnapshot;
use crate::services::geo::GeoDistanceEstimator;
use crate::services::patcher::TimelinePatcher;
use crate::services::scheduler::ItineraryScheduler;
use crate::services::settings::ScheduleSettings;
use crate::types::{
    ErrorResponse, PatchOutcome, PatchPreview, PreviewPointRequest, Request, SuccessResponse, TripDescriptor, TripId,
    TripPlan, TripRequest,
};

/// Shared by all itinerary handlers
pub struct ItineraryState {
    pub pool: PgPool,
    pub settings: ScheduleSettings,
}

/// A request that could not be served, as sent back to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub code: &'static str,
    pub message: String,
}

impl Failure {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            code: "CONFLICT",
            message: message.into(),
        }
    }

    fn database(err: anyhow::Error) -> Self {
        error!("Database error: {:#}", err);
        Self {
            code: "DATABASE_ERROR",
            message: err.to_string(),
        }
    }
}

impl From<SchedulerError> for Failure {
    fn from(err: SchedulerError) -> Self {
        warn!("Scheduling failed: {}", err);
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

async fn load_inputs(state: &ItineraryState, trip_id: TripId) -> Result<(TripDescriptor, CatalogSnapshot), Failure> {
    let trip = queries::trip::load_trip(&state.pool, trip_id)
        .await
        .map_err(Failure::database)?
        .ok_or_else(|| Failure::not_found(format!("Trip {} not found", trip_id)))?;
    let rows = queries::catalog::load_catalog_rows(&state.pool)
        .await
        .map_err(Failure::database)?;
    let snapshot = CatalogSnapshot::from_rows(&rows.points, &rows.windows, state.settings.missing_windows);
    if snapshot.excluded_count() > 0 {
        debug!("{} catalog points excluded from scheduling", snapshot.excluded_count());
    }
    Ok((trip, snapshot))
}

/// Build, store and return the full timeline of a trip
pub async fn build_timeline(state: &ItineraryState, trip_id: TripId) -> Result<TripPlan, Failure> {
    let (trip, snapshot) = load_inputs(state, trip_id).await?;
    let estimator = GeoDistanceEstimator::new(state.settings.estimator);
    let plan = ItineraryScheduler::new(&snapshot, &estimator, &state.settings).build_trip(&trip)?;

    queries::timeline::replace_trip_timeline(&state.pool, &plan)
        .await
        .map_err(Failure::database)?;
    Ok(plan)
}

/// Stored timeline of a trip
pub async fn get_timeline(state: &ItineraryState, trip_id: TripId) -> Result<TripPlan, Failure> {
    queries::timeline::load_trip_plan(&state.pool, trip_id)
        .await
        .map_err(Failure::database)?
        .ok_or_else(|| Failure::not_found(format!("Trip {} has no stored timeline", trip_id)))
}

/// Preview adding a point to one leg, storing the leg when asked and placed.
/// The commit is refused if the stored plan changed in the meantime.
pub async fn preview_point(state: &ItineraryState, request: PreviewPointRequest) -> Result<PatchPreview, Failure> {
    let (trip, snapshot) = load_inputs(state, request.trip_id).await?;
    let stored = get_timeline(state, request.trip_id).await?;

    let estimator = GeoDistanceEstimator::new(state.settings.estimator);
    let scheduler = ItineraryScheduler::new(&snapshot, &estimator, &state.settings);
    let mut preview =
        TimelinePatcher::new(&scheduler).preview(&trip, &stored, request.leg_id, request.point_id)?;
    debug!(
        "Preview of point {} in leg {}: placed = {}",
        request.point_id,
        request.leg_id,
        preview.outcome.is_placed()
    );

    if request.commit {
        if let PatchOutcome::Placed { leg, .. } = &preview.outcome {
            let commit = queries::timeline::commit_leg_timeline(&state.pool, &stored, leg)
                .await
                .map_err(Failure::database)?;
            if commit == LegCommit::Conflict {
                return Err(Failure::conflict(format!(
                    "Timeline of trip {} changed during the preview, retry",
                    request.trip_id
                )));
            }
            preview.committed = true;
            info!(
                "Committed point {} into leg {} of trip {}",
                request.point_id, request.leg_id, request.trip_id
            );
        }
    }
    Ok(preview)
}

/// Request/reply loop shared by the itinerary subjects
async fn serve<T, R, F, Fut>(
    client: Client,
    mut subscriber: Subscriber,
    state: Arc<ItineraryState>,
    subject: &'static str,
    handler: F,
) -> Result<()>
where
    T: DeserializeOwned,
    R: Serialize,
    F: Fn(Arc<ItineraryState>, T) -> Fut,
    Fut: Future<Output = Result<R, Failure>>,
{
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => {
                warn!("{} message without reply subject", subject);
                continue;
            }
        };

        let request: Request<T> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse {} request: {}", subject, e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let bytes = match handler(state.clone(), request.payload).await {
            Ok(payload) => serde_json::to_vec(&SuccessResponse::new(request.id, payload))?,
            Err(failure) => {
                serde_json::to_vec(&ErrorResponse::new(request.id, failure.code, failure.message))?
            }
        };
        let _ = client.publish(reply, bytes.into()).await;
    }

    Ok(())
}

/// Handle itinerary.timeline.build requests
pub async fn handle_build(client: Client, subscriber: Subscriber, state: Arc<ItineraryState>) -> Result<()> {
    serve(client, subscriber, state, "timeline.build", |state, req: TripRequest| async move {
        build_timeline(&state, req.trip_id).await
    })
    .await
}

/// Handle itinerary.timeline.get requests
pub async fn handle_get(client: Client, subscriber: Subscriber, state: Arc<ItineraryState>) -> Result<()> {
    serve(client, subscriber, state, "timeline.get", |state, req: TripRequest| async move {
        get_timeline(&state, req.trip_id).await
    })
    .await
}

/// Handle itinerary.timeline.preview requests
pub async fn handle_preview(client: Client, subscriber: Subscriber, state: Arc<ItineraryState>) -> Result<()> {
    serve(client, subscriber, state, "timeline.preview", |state, req: PreviewPointRequest| async move {
        preview_point(&state, req).await
    })
    .await
}
