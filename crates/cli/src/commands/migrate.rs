//! Database migration command.
//!
//! Applies the migrations embedded in `pickup-server`
//! (`crates/server/migrations/`). Already applied migrations are skipped.

use super::{CommandError, connect};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    pickup_server::db::MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
