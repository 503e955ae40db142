//! Read-side views over issued tokens.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use pickup_core::ShopId;

use super::deadline::call;
use super::{
    BearerToken, Collaborators, IdentityProvider, QueueBacklogReader, ShopDirectory, TokenError,
    TokenStore, authenticate,
};
use crate::models::{ShopSummary, Token};

/// Rows shown on a shop's dashboard.
pub const SHOP_TOKENS_LIMIT: u32 = 50;
/// Rows shown on a customer's token list.
pub const MY_TOKENS_LIMIT: u32 = 50;

/// Public view of a shop's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub shop_id: ShopId,
    pub is_active: bool,
    /// Tokens waiting or being prepared.
    pub backlog: u64,
    /// Position a token issued now would report.
    pub next_position: u64,
}

#[derive(Clone)]
pub struct TokenQueries {
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn ShopDirectory>,
    store: Arc<dyn TokenStore>,
    backlog: QueueBacklogReader,
    timeout: Duration,
}

impl TokenQueries {
    #[must_use]
    pub fn new(collaborators: &Collaborators, upstream_timeout: Duration) -> Self {
        Self {
            identity: Arc::clone(&collaborators.identity),
            directory: Arc::clone(&collaborators.directory),
            store: Arc::clone(&collaborators.store),
            backlog: QueueBacklogReader::new(Arc::clone(&collaborators.store), upstream_timeout),
            timeout: upstream_timeout,
        }
    }

    /// The caller's own tokens, newest first.
    ///
    /// # Errors
    ///
    /// `Unauthorized` without valid credentials.
    pub async fn my_tokens(&self, credential: Option<&BearerToken>) -> Result<Vec<Token>, TokenError> {
        let customer = authenticate(&*self.identity, credential, self.timeout).await?;
        call(
            self.timeout,
            "token_store.list_for_customer",
            self.store.list_for_customer(customer, MY_TOKENS_LIMIT),
        )
        .await
    }

    /// The shop's most recent tokens for its dashboard.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller owns or staffs the shop.
    pub async fn shop_tokens(
        &self,
        credential: Option<&BearerToken>,
        shop_id: ShopId,
    ) -> Result<Vec<Token>, TokenError> {
        let actor = authenticate(&*self.identity, credential, self.timeout).await?;
        call(
            self.timeout,
            "token_store.list_for_shop",
            self.store.list_for_shop(actor, shop_id, SHOP_TOKENS_LIMIT),
        )
        .await
    }

    /// Token counts per status.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller owns or staffs the shop.
    pub async fn shop_summary(
        &self,
        credential: Option<&BearerToken>,
        shop_id: ShopId,
    ) -> Result<ShopSummary, TokenError> {
        let actor = authenticate(&*self.identity, credential, self.timeout).await?;
        call(
            self.timeout,
            "token_store.shop_summary",
            self.store.shop_summary(actor, shop_id),
        )
        .await
    }

    /// Current backlog of a shop. Needs no credentials.
    ///
    /// # Errors
    ///
    /// `ShopNotFound` for unknown shops.
    pub async fn queue_length(&self, shop_id: ShopId) -> Result<QueueSnapshot, TokenError> {
        let shop = call(self.timeout, "shop_directory.get", self.directory.get(shop_id))
            .await?
            .ok_or_else(|| TokenError::ShopNotFound(shop_id.to_string()))?;
        let backlog = self.backlog.count(shop.id).await?;
        Ok(QueueSnapshot {
            shop_id: shop.id,
            is_active: shop.is_active,
            backlog,
            next_position: backlog.saturating_add(1),
        })
    }
}
