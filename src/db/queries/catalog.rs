//! Point catalog queries

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::debug;

use crate::types::{OperatingWindowRow, PointRow};

/// Raw catalog rows; validation happens in the snapshot
#[derive(Debug, Clone, Default)]
pub struct CatalogRows {
    pub points: Vec<PointRow>,
    pub windows: Vec<OperatingWindowRow>,
}

/// Load every non-deleted point and all operating windows
pub async fn load_catalog_rows(pool: &PgPool) -> Result<CatalogRows> {
    let points = sqlx::query_as::<_, PointRow>(
        r#"
        SELECT
            id, name, lat, lng, visit_duration_minutes,
            priority, location_tags, is_active, is_deleted
        FROM points_of_interest
        WHERE is_deleted = FALSE
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to load points of interest")?;

    let windows = sqlx::query_as::<_, OperatingWindowRow>(
        r#"
        SELECT w.point_id, w.weekday, w.start_time, w.end_time, w.is_closed, w.is_always_open
        FROM point_operating_windows w
        JOIN points_of_interest p ON p.id = w.point_id
        WHERE p.is_deleted = FALSE
        ORDER BY w.point_id, w.weekday, w.start_time NULLS FIRST
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to load operating windows")?;

    debug!("Loaded catalog: {} points, {} window rows", points.len(), windows.len());
    Ok(CatalogRows { points, windows })
}
