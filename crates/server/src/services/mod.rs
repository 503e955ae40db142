//! Token issuance, lifecycle and read services.
//!
//! # Flow
//!
//! ```text
//! issue:  identity -> shop directory -> validate -> backlog count
//!         -> ETA -> token number -> conditional insert (retry on conflict)
//! serve:  identity -> load token -> transition table -> compare-and-set
//! ```
//!
//! Services hold no per-request state. All coordination between concurrent
//! requests happens in the [`TokenStore`]: the unique token number on insert
//! and the compare-and-set on status changes.

pub mod backlog;
mod deadline;
pub mod error;
pub mod issuer;
pub mod lifecycle;
pub mod memory;
pub mod ports;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use pickup_core::UserId;

pub use backlog::QueueBacklogReader;
pub use error::TokenError;
pub use issuer::{Coordinates, IssuancePolicy, IssueRequest, TokenIssuer};
pub use lifecycle::TokenLifecycle;
pub use ports::{
    BearerToken, Clock, IdentityProvider, MonotonicClock, RandomTokenNumbers, ShopDirectory,
    TokenNumberGenerator, TokenStore,
};
pub use queries::{QueueSnapshot, TokenQueries};

use deadline::call;

/// The external collaborators every service is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub directory: Arc<dyn ShopDirectory>,
    pub store: Arc<dyn TokenStore>,
    pub clock: Arc<dyn Clock>,
    pub numbers: Arc<dyn TokenNumberGenerator>,
}

/// Resolve the caller, rejecting missing or unknown credentials.
pub(crate) async fn authenticate(
    identity: &dyn IdentityProvider,
    credential: Option<&BearerToken>,
    limit: Duration,
) -> Result<UserId, TokenError> {
    let Some(credential) = credential else {
        return Err(TokenError::Unauthorized);
    };
    call(
        limit,
        "identity.authenticate",
        identity.authenticate(credential),
    )
    .await?
    .ok_or(TokenError::Unauthorized)
}
