//! Backlog counts per shop.

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use pickup_core::ShopId;

use super::deadline::call;
use super::{TokenError, TokenStore};

/// Counts a shop's unserved tokens.
///
/// The count is a snapshot. It is not linearizable with inserts running
/// concurrently in other requests, so two callers can observe the same value.
#[derive(Clone)]
pub struct QueueBacklogReader {
    store: Arc<dyn TokenStore>,
    timeout: Duration,
}

impl QueueBacklogReader {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Tokens for `shop_id` in `pending` or `preparing`. A shop with no
    /// tokens yet has a backlog of zero.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` or `UpstreamUnavailable` if the store cannot answer.
    #[instrument(skip(self), fields(shop_id = %shop_id))]
    pub async fn count(&self, shop_id: ShopId) -> Result<u64, TokenError> {
        call(
            self.timeout,
            "token_store.count_backlog",
            self.store.count_backlog(shop_id),
        )
        .await
    }
}
