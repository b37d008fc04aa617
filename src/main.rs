//! Itinerary Worker - trip timeline scheduling service
//!
//! Builds per-day visit timelines for multi-day trips and answers
//! "add this point" previews over NATS.

mod cli;
mod config;
mod db;
mod defaults;
mod error;
mod handlers;
mod services;
mod types;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::services::plan_diff::diff_plans;
use crate::services::scheduler::plan_from_input;
use crate::types::{PlanningInput, TripPlan};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ../logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "itinerary-worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Console output goes to stderr so `plan` and `diff` can print JSON on stdout
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,itinerary_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Migrate => {
            let pool = db::create_pool(config.require_database_url()?).await?;
            db::run_migrations(&pool).await
        }
        Command::Plan { input, output } => plan(&config, &input, output.as_deref()),
        Command::Diff { a, b } => diff(&a, &b),
    }
}

async fn serve(config: &Config) -> Result<()> {
    info!("Starting Itinerary Worker...");

    let pool = db::create_pool(config.require_database_url()?).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    if let Err(e) = handlers::start_handlers(nats_client, pool, config).await {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn plan(config: &Config, input: &Path, output: Option<&Path>) -> Result<()> {
    let document: PlanningInput = read_json(input)?;
    let plan = plan_from_input(&document, &config.schedule)
        .with_context(|| format!("Failed to schedule trip {}", document.trip.id))?;

    for leg in &plan.legs {
        info!(
            "Leg {} ({}): {} visits, {} skipped",
            leg.leg_id,
            leg.date,
            leg.visits().count(),
            leg.skipped.len()
        );
    }

    let json = serde_json::to_string_pretty(&plan)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Plan written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn diff(a: &Path, b: &Path) -> Result<()> {
    let first: TripPlan = read_json(a)?;
    let second: TripPlan = read_json(b)?;

    let comparison = diff_plans(&first, &second);
    let changed = comparison.iter().filter(|c| !c.is_same()).count();
    info!("{} of {} legs differ", changed, comparison.len());

    println!("{}", serde_json::to_string_pretty(&comparison)?);
    Ok(())
}
