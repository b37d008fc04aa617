//! NATS message handlers

pub mod itinerary;
pub mod ping;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use itinerary::ItineraryState;

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let state = Arc::new(ItineraryState {
        pool,
        settings: config.schedule.clone(),
    });
    info!(
        "Scheduler settings: missing windows {}, selection {}",
        state.settings.missing_windows, state.settings.selection
    );

    // Subscribe to all subjects
    let ping_sub = client.subscribe("itinerary.ping").await?;
    let build_sub = client.subscribe("itinerary.timeline.build").await?;
    let get_sub = client.subscribe("itinerary.timeline.get").await?;
    let preview_sub = client.subscribe("itinerary.timeline.preview").await?;

    info!("Subscribed to NATS subjects");

    let client_ping = client.clone();
    let client_build = client.clone();
    let client_get = client.clone();
    let client_preview = client.clone();

    let state_build = state.clone();
    let state_get = state.clone();
    let state_preview = state;

    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let build_handle = tokio::spawn(async move {
        itinerary::handle_build(client_build, build_sub, state_build).await
    });

    let get_handle = tokio::spawn(async move {
        itinerary::handle_get(client_get, get_sub, state_get).await
    });

    let preview_handle = tokio::spawn(async move {
        itinerary::handle_preview(client_preview, preview_sub, state_preview).await
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which indicates an error)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = build_handle => {
            error!("Timeline build handler finished: {:?}", result);
        }
        result = get_handle => {
            error!("Timeline get handler finished: {:?}", result);
        }
        result = preview_handle => {
            error!("Timeline preview handler finished: {:?}", result);
        }
    }

    Ok(())
}
