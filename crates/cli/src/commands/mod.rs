//! CLI command implementations.

pub mod migrate;
pub mod session;
pub mod shop;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by all commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] pickup_server::db::RepositoryError),

    /// Argument out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Connect using `PICKUP_DATABASE_URL`, falling back to `DATABASE_URL`.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("PICKUP_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("PICKUP_DATABASE_URL"))?;

    tracing::info!("Connecting to pickup database...");
    let pool = pickup_server::db::create_pool(
        &SecretString::from(database_url),
        std::time::Duration::from_secs(10),
    )
    .await?;
    Ok(pool)
}
