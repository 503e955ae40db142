//! API session commands.

use chrono::TimeDelta;

use pickup_core::UserId;
use pickup_server::db::sessions::create_session;

use super::{CommandError, connect};

/// Create a session for `user` and print its bearer token.
///
/// The token is printed exactly once; only its digest is stored.
///
/// # Errors
///
/// Returns an error if `ttl_hours` is zero or the insert fails.
#[allow(clippy::print_stdout)]
pub async fn create(user: UserId, ttl_hours: u32) -> Result<(), CommandError> {
    if ttl_hours == 0 {
        return Err(CommandError::InvalidArgument(
            "ttl-hours must be at least 1".to_string(),
        ));
    }
    let pool = connect().await?;

    let session = create_session(&pool, user, TimeDelta::hours(i64::from(ttl_hours))).await?;

    tracing::info!(user_id = %session.user_id, expires_at = %session.expires_at, "Session created");
    println!("{}", session.token.expose());
    Ok(())
}
