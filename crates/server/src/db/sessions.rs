//! API sessions backed by `pickup.api_session`.
//!
//! Bearer tokens are random and opaque. Only their SHA-256 digest is stored,
//! so a leaked table cannot be replayed.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use pickup_core::UserId;

use super::RepositoryError;
use crate::services::{BearerToken, IdentityProvider};

/// Random bytes in a freshly minted bearer token.
const TOKEN_BYTES: usize = 32;

/// Hex-encoded SHA-256 digest of a raw bearer token.
#[must_use]
pub fn hash_bearer(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// A newly created session. `token` is shown once and never stored.
#[derive(Debug)]
pub struct NewSession {
    pub token: BearerToken,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

/// Mint a bearer token for `user_id` valid for `ttl`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn create_session(
    pool: &PgPool,
    user_id: UserId,
    ttl: TimeDelta,
) -> Result<NewSession, RepositoryError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let expires_at = Utc::now() + ttl;

    sqlx::query(
        r"
        INSERT INTO pickup.api_session (token_hash, user_id, expires_at)
        VALUES ($1, $2, $3)
        ",
    )
    .bind(hash_bearer(&raw))
    .bind(user_id)
    .bind(expires_at)
    .execute(pool)
    .await
    .map_err(|e| RepositoryError::from_write(e, "session"))?;

    Ok(NewSession {
        token: BearerToken::new(raw),
        user_id,
        expires_at,
    })
}

/// Resolves bearer tokens against stored session digests.
#[derive(Clone)]
pub struct PgIdentityProvider {
    pool: PgPool,
}

impl PgIdentityProvider {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn authenticate(
        &self,
        credential: &BearerToken,
    ) -> Result<Option<UserId>, RepositoryError> {
        let user = sqlx::query_scalar::<_, UserId>(
            r"
            SELECT user_id
            FROM pickup.api_session
            WHERE token_hash = $1 AND expires_at > NOW()
            ",
        )
        .bind(hash_bearer(credential.expose()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
