//! Capabilities the token services depend on.
//!
//! Every external collaborator is reached through one of these traits and
//! handed to the services at construction time. Postgres implementations live
//! in [`crate::db`], in-memory ones in [`super::memory`].

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};

use pickup_core::{ShopId, TokenId, TokenNumber, TokenStatus, UserId};

use crate::db::RepositoryError;
use crate::models::{Shop, ShopSummary, Token};

/// An opaque bearer credential presented by a caller.
#[derive(Clone)]
pub struct BearerToken(SecretString);

impl BearerToken {
    /// Wrap a raw credential.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::from(raw.into()))
    }

    /// Access the raw credential.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Resolves caller credentials to a stable user identifier.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns `None` when the credential is unknown or expired.
    async fn authenticate(&self, credential: &BearerToken)
    -> Result<Option<UserId>, RepositoryError>;
}

/// Read-only access to shop metadata.
#[async_trait]
pub trait ShopDirectory: Send + Sync {
    async fn get(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError>;
}

/// Durable token storage.
///
/// Implementations own the access policy: only the shop's owner or staff may
/// change a token's status or list a shop's tokens, and a customer may cancel
/// their own token. Violations surface as [`RepositoryError::Forbidden`].
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a new token.
    ///
    /// Fails with [`RepositoryError::Conflict`] when the token number is
    /// already taken, and with [`RepositoryError::ShopInactive`] unless the
    /// token's shop is active at the moment of the write. Nothing is written
    /// in either case.
    async fn insert(&self, token: &Token) -> Result<(), RepositoryError>;

    /// Number of tokens for the shop in `pending` or `preparing`.
    async fn count_backlog(&self, shop_id: ShopId) -> Result<u64, RepositoryError>;

    async fn get(&self, id: TokenId) -> Result<Option<Token>, RepositoryError>;

    /// Compare-and-set the status.
    ///
    /// Returns `Ok(None)` without writing when the current status is not
    /// `expected`, and [`RepositoryError::NotFound`] for unknown tokens.
    /// When `expected == next` the access policy is still applied but nothing
    /// is written; the stored token is returned as-is.
    async fn update_status(
        &self,
        actor: UserId,
        id: TokenId,
        expected: TokenStatus,
        next: TokenStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Token>, RepositoryError>;

    /// The customer's tokens, newest first.
    async fn list_for_customer(
        &self,
        customer_id: UserId,
        limit: u32,
    ) -> Result<Vec<Token>, RepositoryError>;

    /// The shop's tokens, newest first.
    async fn list_for_shop(
        &self,
        actor: UserId,
        shop_id: ShopId,
        limit: u32,
    ) -> Result<Vec<Token>, RepositoryError>;

    async fn shop_summary(
        &self,
        actor: UserId,
        shop_id: ShopId,
    ) -> Result<ShopSummary, RepositoryError>;

    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Source of "now" for issuance.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time anchored once at startup and advanced by a monotonic timer.
///
/// Later wall-clock corrections (NTP steps, manual changes) cannot move
/// issued timestamps backwards.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            anchor_wall: Utc::now(),
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor_wall
            .checked_add_signed(elapsed)
            .unwrap_or(self.anchor_wall)
    }
}

/// Produces candidate token numbers.
pub trait TokenNumberGenerator: Send + Sync {
    fn generate(&self, now: DateTime<Utc>) -> TokenNumber;
}

/// `TKN-<millis>-<random base36>` candidates from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenNumbers;

impl TokenNumberGenerator for RandomTokenNumbers {
    fn generate(&self, now: DateTime<Utc>) -> TokenNumber {
        TokenNumber::generate(now, &mut rand::rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..1000 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_bearer_debug_is_redacted() {
        let token = BearerToken::new("super-secret");
        assert_eq!(format!("{token:?}"), "BearerToken([REDACTED])");
        assert_eq!(token.expose(), "super-secret");
    }
}
