//! Database module

pub mod queries;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Run the embedded migrations.
///
/// Stored checksums are first re-synced with the compiled ones, so a
/// migration file checked out with different line endings does not block
/// start-up.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    let migrator = sqlx::migrate!("./migrations");
    sync_migration_checksums(pool, &migrator).await?;
    migrator
        .run(pool)
        .await
        .context("Failed to apply migrations")?;

    info!("Database migrations complete");
    Ok(())
}

async fn sync_migration_checksums(pool: &PgPool, migrator: &Migrator) -> Result<()> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;
    if !table_exists {
        return Ok(());
    }

    for migration in migrator.iter().filter(|m| !m.migration_type.is_down_migration()) {
        let current: &[u8] = &migration.checksum;
        let updated = sqlx::query(
            "UPDATE _sqlx_migrations SET checksum = $1 WHERE version = $2 AND checksum <> $1",
        )
        .bind(current)
        .bind(migration.version)
        .execute(pool)
        .await?;

        if updated.rows_affected() > 0 {
            warn!(
                "Migration {} ({}) checksum differed from the binary, stored checksum updated",
                migration.version, migration.description
            );
        }
    }
    Ok(())
}
