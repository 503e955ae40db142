//! Token status changes after issuance.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use pickup_core::{TokenId, TokenStatus, parse_scan_payload};

use super::deadline::{bounded, call};
use super::{BearerToken, Clock, Collaborators, IdentityProvider, TokenError, TokenStore, authenticate};
use crate::db::RepositoryError;
use crate::models::Token;

/// Status can change at most twice after a read (pending -> preparing ->
/// terminal), so a third compare-and-set always sees a settled value.
const MAX_CAS_ATTEMPTS: u32 = 3;

/// Moves tokens through `pending -> preparing -> served` and cancellation.
#[derive(Clone)]
pub struct TokenLifecycle {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl TokenLifecycle {
    #[must_use]
    pub fn new(collaborators: &Collaborators, upstream_timeout: Duration) -> Self {
        Self {
            identity: Arc::clone(&collaborators.identity),
            store: Arc::clone(&collaborators.store),
            clock: Arc::clone(&collaborators.clock),
            timeout: upstream_timeout,
        }
    }

    /// Mark a token served, from `pending` or `preparing`.
    ///
    /// Serving an already served token returns it unchanged, so duplicate
    /// scans are harmless.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for cancelled tokens, `Forbidden` when the caller
    /// does not manage the token's shop.
    pub async fn mark_served(
        &self,
        credential: Option<&BearerToken>,
        token_id: TokenId,
    ) -> Result<Token, TokenError> {
        self.advance(credential, token_id, TokenStatus::Served).await
    }

    /// Mark served from a raw QR payload: a bare token ID or a JSON object
    /// carrying `token_id` or `id`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for unreadable payloads, otherwise as [`Self::mark_served`].
    pub async fn mark_served_from_scan(
        &self,
        credential: Option<&BearerToken>,
        payload: &str,
    ) -> Result<Token, TokenError> {
        let token_id = parse_scan_payload(payload)?;
        self.mark_served(credential, token_id).await
    }

    /// Move a pending token to `preparing`.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for served or cancelled tokens.
    pub async fn start_preparing(
        &self,
        credential: Option<&BearerToken>,
        token_id: TokenId,
    ) -> Result<Token, TokenError> {
        self.advance(credential, token_id, TokenStatus::Preparing).await
    }

    /// Cancel a token that has not been served yet.
    ///
    /// Allowed for the shop's managers and for the customer who holds the
    /// token.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for served tokens.
    pub async fn cancel(
        &self,
        credential: Option<&BearerToken>,
        token_id: TokenId,
    ) -> Result<Token, TokenError> {
        self.advance(credential, token_id, TokenStatus::Cancelled).await
    }

    #[instrument(skip(self, credential), fields(%token_id, %target))]
    async fn advance(
        &self,
        credential: Option<&BearerToken>,
        token_id: TokenId,
        target: TokenStatus,
    ) -> Result<Token, TokenError> {
        let actor = authenticate(&*self.identity, credential, self.timeout).await?;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = call(self.timeout, "token_store.get", self.store.get(token_id))
                .await?
                .ok_or(TokenError::TokenNotFound(token_id))?;
            let from = current.status;
            if from != target && !from.can_advance_to(target) {
                return Err(TokenError::InvalidTransition { from, to: target });
            }

            let update = self
                .store
                .update_status(actor, token_id, from, target, self.clock.now());
            match bounded(self.timeout, "token_store.update_status", update).await? {
                Ok(Some(token)) => {
                    if from != target {
                        info!(%from, token_number = %token.token_number, "Token status changed");
                    }
                    return Ok(token);
                }
                Ok(None) => debug!(attempt, %from, "Status changed concurrently, re-reading"),
                Err(RepositoryError::NotFound) => return Err(TokenError::TokenNotFound(token_id)),
                Err(e) => {
                    return Err(TokenError::from_repository("token_store.update_status", &e));
                }
            }
        }

        warn!(attempts = MAX_CAS_ATTEMPTS, "Status never settled");
        Err(TokenError::UpstreamUnavailable("token_store.update_status"))
    }
}
