//! Database operations for the pickup `PostgreSQL` database.
//!
//! ## Tables (schema `pickup`)
//!
//! - `shop` - Shops, owner and average service time
//! - `shop_staff` - Users allowed to scan and manage a shop's tokens
//! - `api_session` - Bearer token digests for API callers
//! - `token` - Issued pickup tokens (`token_number` is UNIQUE)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p pickup-cli -- migrate
//! ```

pub mod sessions;
pub mod shops;
pub mod tokens;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use sessions::PgIdentityProvider;
pub use shops::PgShopDirectory;
pub use tokens::PgTokenStore;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate token number).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The token's shop is not accepting new tokens.
    #[error("shop is not active")]
    ShopInactive,

    /// The store's access policy denied the actor.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl RepositoryError {
    /// Map a sqlx error, turning unique violations into [`Self::Conflict`].
    pub(crate) fn from_write(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `acquire_timeout` - How long to wait for a free connection
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(acquire_timeout)
        .connect(database_url.expose_secret())
        .await
}
