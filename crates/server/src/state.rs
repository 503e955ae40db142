//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::{PgIdentityProvider, PgShopDirectory, PgTokenStore};
use crate::services::{
    Collaborators, MonotonicClock, RandomTokenNumbers, TokenIssuer, TokenLifecycle, TokenQueries,
    TokenStore,
};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Holds the token services, which in turn hold
/// every external collaborator; handlers never reach a collaborator directly
/// except for the readiness probe.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    issuer: TokenIssuer,
    lifecycle: TokenLifecycle,
    queries: TokenQueries,
    store: Arc<dyn TokenStore>,
}

impl AppState {
    /// Build the services from explicit collaborators.
    #[must_use]
    pub fn new(config: ServerConfig, collaborators: &Collaborators) -> Self {
        let issuer = TokenIssuer::new(collaborators, config.issuance_policy());
        let lifecycle = TokenLifecycle::new(collaborators, config.upstream_timeout);
        let queries = TokenQueries::new(collaborators, config.upstream_timeout);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                issuer,
                lifecycle,
                queries,
                store: Arc::clone(&collaborators.store),
            }),
        }
    }

    /// Wire the `PostgreSQL` adapters, the monotonic clock and random token
    /// numbers.
    #[must_use]
    pub fn from_pool(config: ServerConfig, pool: &PgPool) -> Self {
        let collaborators = Collaborators {
            identity: Arc::new(PgIdentityProvider::new(pool.clone())),
            directory: Arc::new(PgShopDirectory::new(pool.clone(), config.shop_cache_ttl)),
            store: Arc::new(PgTokenStore::new(pool.clone())),
            clock: Arc::new(MonotonicClock::new()),
            numbers: Arc::new(RandomTokenNumbers),
        };
        Self::new(config, &collaborators)
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.inner.issuer
    }

    #[must_use]
    pub fn lifecycle(&self) -> &TokenLifecycle {
        &self.inner.lifecycle
    }

    #[must_use]
    pub fn queries(&self) -> &TokenQueries {
        &self.inner.queries
    }

    /// Token store, for readiness checks.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }
}
