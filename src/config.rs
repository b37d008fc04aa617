//! Configuration management

use std::str::FromStr;

use anyhow::{self, Context, Result};

use crate::services::settings::ScheduleSettings;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string; only `serve` and `migrate` need it
    pub database_url: Option<String>,

    /// Scheduler tuning, defaults overridden by `SCHEDULER_*` variables
    pub schedule: ScheduleSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let nats_url = lookup("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let mut schedule = ScheduleSettings::default();
        let e = &mut schedule.estimator;
        override_from(&lookup, "SCHEDULER_ROAD_CORRECTION", &mut e.road_correction)?;
        override_from(&lookup, "SCHEDULER_LOCAL_SPEED_KMH", &mut e.local_speed_kmh)?;
        override_from(&lookup, "SCHEDULER_OUTSTATION_SPEED_KMH", &mut e.outstation_speed_kmh)?;
        override_from(&lookup, "SCHEDULER_LOCAL_BUFFER_MIN", &mut e.local_buffer_minutes)?;
        override_from(&lookup, "SCHEDULER_OUTSTATION_BUFFER_MIN", &mut e.outstation_buffer_minutes)?;
        override_from(
            &lookup,
            "SCHEDULER_REFRESHMENT_INTERVAL_MIN",
            &mut schedule.refreshment_interval_minutes,
        )?;
        override_from(&lookup, "SCHEDULER_REFRESHMENT_MIN", &mut schedule.refreshment_minutes)?;
        override_from(&lookup, "SCHEDULER_PARKING_MIN", &mut schedule.parking_minutes)?;
        override_from(&lookup, "SCHEDULER_MISSING_WINDOWS", &mut schedule.missing_windows)?;
        override_from(&lookup, "SCHEDULER_SELECTION", &mut schedule.selection)?;

        schedule
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid scheduler settings: {}", e))?;

        Ok(Self {
            nats_url,
            database_url,
            schedule,
        })
    }

    /// Database URL, or an error naming the missing variable
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set")
    }
}

fn override_from<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))?;
    }
    Ok(())
}
