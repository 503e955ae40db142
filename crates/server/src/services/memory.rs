//! In-memory collaborators.
//!
//! Used by tests and local demos. They follow the same contracts as the
//! Postgres adapters, including the unique token number and the access policy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use pickup_core::{ShopId, TokenId, TokenNumber, TokenStatus, UserId};

use super::Collaborators;
use super::ports::{
    BearerToken, Clock, IdentityProvider, RandomTokenNumbers, ShopDirectory, TokenStore,
};
use crate::db::RepositoryError;
use crate::models::{Shop, ShopSummary, Token};

/// Bearer tokens mapped straight to users.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    sessions: RwLock<HashMap<String, UserId>>,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `raw` as a credential for `user`.
    pub async fn register(&self, raw: &str, user: UserId) {
        self.sessions.write().await.insert(raw.to_owned(), user);
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn authenticate(
        &self,
        credential: &BearerToken,
    ) -> Result<Option<UserId>, RepositoryError> {
        Ok(self.sessions.read().await.get(credential.expose()).copied())
    }
}

#[derive(Default)]
pub struct MemoryShopDirectory {
    shops: RwLock<HashMap<ShopId, Shop>>,
}

impl MemoryShopDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, shop: Shop) {
        self.shops.write().await.insert(shop.id, shop);
    }

    pub async fn set_active(&self, id: ShopId, is_active: bool) {
        if let Some(shop) = self.shops.write().await.get_mut(&id) {
            shop.is_active = is_active;
        }
    }
}

#[async_trait]
impl ShopDirectory for MemoryShopDirectory {
    async fn get(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError> {
        Ok(self.shops.read().await.get(&id).cloned())
    }
}

#[derive(Default)]
struct StoreInner {
    tokens: HashMap<TokenId, Token>,
    numbers: HashSet<TokenNumber>,
    managers: HashMap<ShopId, HashSet<UserId>>,
    closed: HashSet<ShopId>,
}

impl StoreInner {
    fn can_manage(&self, actor: UserId, shop_id: ShopId) -> bool {
        self.managers
            .get(&shop_id)
            .is_some_and(|users| users.contains(&actor))
    }
}

/// Token table guarded by a single lock.
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: RwLock<StoreInner>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `user` manage `shop_id` (owner or staff).
    pub async fn grant_manager(&self, shop_id: ShopId, user: UserId) {
        self.inner
            .write()
            .await
            .managers
            .entry(shop_id)
            .or_default()
            .insert(user);
    }

    /// Accept or refuse new tokens for `shop_id`. Shops start open.
    pub async fn set_shop_active(&self, shop_id: ShopId, is_active: bool) {
        let mut inner = self.inner.write().await;
        if is_active {
            inner.closed.remove(&shop_id);
        } else {
            inner.closed.insert(shop_id);
        }
    }

    /// Insert a token as-is, bypassing the uniqueness check.
    pub async fn seed(&self, token: Token) {
        let mut inner = self.inner.write().await;
        inner.numbers.insert(token.token_number.clone());
        inner.tokens.insert(token.id, token);
    }

    /// Number of stored tokens.
    pub async fn len(&self) -> usize {
        self.inner.read().await.tokens.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn newest_first(mut tokens: Vec<Token>, limit: u32) -> Vec<Token> {
    tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    tokens.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    tokens
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, token: &Token) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        if inner.closed.contains(&token.shop_id) {
            return Err(RepositoryError::ShopInactive);
        }
        if inner.numbers.contains(&token.token_number) {
            return Err(RepositoryError::Conflict(
                "token number already exists".to_owned(),
            ));
        }
        if inner.tokens.contains_key(&token.id) {
            return Err(RepositoryError::Conflict("token id already exists".to_owned()));
        }
        inner.numbers.insert(token.token_number.clone());
        inner.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn count_backlog(&self, shop_id: ShopId) -> Result<u64, RepositoryError> {
        let inner = self.inner.read().await;
        let count = inner
            .tokens
            .values()
            .filter(|t| t.shop_id == shop_id && !t.status.is_terminal())
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn get(&self, id: TokenId) -> Result<Option<Token>, RepositoryError> {
        Ok(self.inner.read().await.tokens.get(&id).cloned())
    }

    async fn update_status(
        &self,
        actor: UserId,
        id: TokenId,
        expected: TokenStatus,
        next: TokenStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Token>, RepositoryError> {
        let mut inner = self.inner.write().await;
        let (shop_id, customer_id, current) = inner
            .tokens
            .get(&id)
            .map(|t| (t.shop_id, t.customer_id, t.status))
            .ok_or(RepositoryError::NotFound)?;

        let allowed = (next == TokenStatus::Cancelled && customer_id == actor)
            || inner.can_manage(actor, shop_id);
        if !allowed {
            return Err(RepositoryError::Forbidden(format!(
                "user {actor} cannot manage shop {shop_id}"
            )));
        }
        if current != expected {
            return Ok(None);
        }
        if expected == next {
            return Ok(inner.tokens.get(&id).cloned());
        }

        let Some(token) = inner.tokens.get_mut(&id) else {
            return Err(RepositoryError::NotFound);
        };
        token.status = next;
        token.updated_at = at;
        Ok(Some(token.clone()))
    }

    async fn list_for_customer(
        &self,
        customer_id: UserId,
        limit: u32,
    ) -> Result<Vec<Token>, RepositoryError> {
        let inner = self.inner.read().await;
        let tokens = inner
            .tokens
            .values()
            .filter(|t| t.customer_id == customer_id)
            .cloned()
            .collect();
        Ok(newest_first(tokens, limit))
    }

    async fn list_for_shop(
        &self,
        actor: UserId,
        shop_id: ShopId,
        limit: u32,
    ) -> Result<Vec<Token>, RepositoryError> {
        let inner = self.inner.read().await;
        if !inner.can_manage(actor, shop_id) {
            return Err(RepositoryError::Forbidden(format!(
                "user {actor} cannot manage shop {shop_id}"
            )));
        }
        let tokens = inner
            .tokens
            .values()
            .filter(|t| t.shop_id == shop_id)
            .cloned()
            .collect();
        Ok(newest_first(tokens, limit))
    }

    async fn shop_summary(
        &self,
        actor: UserId,
        shop_id: ShopId,
    ) -> Result<ShopSummary, RepositoryError> {
        let inner = self.inner.read().await;
        if !inner.can_manage(actor, shop_id) {
            return Err(RepositoryError::Forbidden(format!(
                "user {actor} cannot manage shop {shop_id}"
            )));
        }
        let mut summary = ShopSummary::default();
        for token in inner.tokens.values().filter(|t| t.shop_id == shop_id) {
            match token.status {
                TokenStatus::Pending => summary.pending += 1,
                TokenStatus::Preparing => summary.preparing += 1,
                TokenStatus::Served => summary.served += 1,
                TokenStatus::Cancelled => summary.cancelled += 1,
            }
        }
        Ok(summary)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A token with plausible fields in the given status, for seeding stores.
///
/// # Panics
///
/// Never in practice; the fixed coordinates are in range.
#[cfg(any(test, feature = "test-support"))]
#[must_use]
pub fn sample_token(shop_id: ShopId, status: TokenStatus) -> Token {
    let now = Utc::now();
    Token {
        id: TokenId::generate(),
        token_number: TokenNumber::generate(now, &mut rand::rng()),
        shop_id,
        customer_id: UserId::generate(),
        customer_location: pickup_core::GeoPoint::new(12.9716, 77.5946)
            .expect("fixed coordinates are in range"),
        distance_meters: 1000.0,
        traffic_duration_minutes: 3,
        service_minutes: 5,
        queue_position: 1,
        estimated_pickup_time: now + chrono::TimeDelta::minutes(8),
        status,
        created_at: now,
        updated_at: now,
    }
}

/// Credential registered for [`MemoryFixture::customer`].
pub const CUSTOMER_CREDENTIAL: &str = "customer-session";
/// Credential registered for [`MemoryFixture::owner`].
pub const OWNER_CREDENTIAL: &str = "owner-session";

/// In-memory collaborators wired together with a customer and a shop owner.
pub struct MemoryFixture {
    pub identity: Arc<MemoryIdentityProvider>,
    pub directory: Arc<MemoryShopDirectory>,
    pub store: Arc<MemoryTokenStore>,
    pub customer: UserId,
    pub owner: UserId,
}

impl MemoryFixture {
    pub async fn new() -> Self {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let customer = UserId::generate();
        let owner = UserId::generate();
        identity.register(CUSTOMER_CREDENTIAL, customer).await;
        identity.register(OWNER_CREDENTIAL, owner).await;
        Self {
            identity,
            directory: Arc::new(MemoryShopDirectory::new()),
            store: Arc::new(MemoryTokenStore::new()),
            customer,
            owner,
        }
    }

    /// Collaborators backed by this fixture with random token numbers.
    #[must_use]
    pub fn collaborators(&self, clock: Arc<dyn Clock>) -> Collaborators {
        Collaborators {
            identity: Arc::clone(&self.identity) as Arc<dyn IdentityProvider>,
            directory: Arc::clone(&self.directory) as Arc<dyn ShopDirectory>,
            store: Arc::clone(&self.store) as Arc<dyn TokenStore>,
            clock,
            numbers: Arc::new(RandomTokenNumbers),
        }
    }

    /// Register a shop owned by [`Self::owner`].
    pub async fn add_shop(&self, average_service_time_minutes: i32, is_active: bool) -> Shop {
        let shop = Shop {
            id: ShopId::generate(),
            owner_id: self.owner,
            name: "Corner Bakery".to_owned(),
            average_service_time_minutes,
            is_active,
        };
        self.directory.upsert(shop.clone()).await;
        self.store.grant_manager(shop.id, self.owner).await;
        self.store.set_shop_active(shop.id, is_active).await;
        shop
    }

    /// Open or close a shop in both the directory and the store.
    pub async fn set_shop_active(&self, shop_id: ShopId, is_active: bool) {
        self.directory.set_active(shop_id, is_active).await;
        self.store.set_shop_active(shop_id, is_active).await;
    }

    #[must_use]
    pub fn customer_credential(&self) -> BearerToken {
        BearerToken::new(CUSTOMER_CREDENTIAL)
    }

    #[must_use]
    pub fn owner_credential(&self) -> BearerToken {
        BearerToken::new(OWNER_CREDENTIAL)
    }
}
