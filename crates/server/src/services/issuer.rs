//! Token issuance.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use pickup_core::{GeoPoint, ShopId, TokenId, TokenStatus, estimate_pickup};

use super::deadline::{bounded, call};
use super::{
    BearerToken, Clock, Collaborators, IdentityProvider, QueueBacklogReader, ShopDirectory,
    TokenError, TokenNumberGenerator, TokenStore, authenticate,
};
use crate::db::RepositoryError;
use crate::models::{IssuedToken, Shop, Token};

/// Raw latitude/longitude as sent by clients. Validated into a
/// [`GeoPoint`] during issuance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// What a customer asks for when requesting a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRequest {
    /// Kept as text so an unparseable ID reports "shop not found" after the
    /// caller has been authenticated.
    pub shop_id: String,
    pub customer_location: Coordinates,
    pub distance_meters: f64,
}

/// Tunables for issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuancePolicy {
    /// Deadline for each call into a collaborator.
    pub upstream_timeout: Duration,
    /// How many token numbers to try before giving up.
    pub token_number_attempts: u32,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self {
            upstream_timeout: Duration::from_secs(5),
            token_number_attempts: 5,
        }
    }
}

/// Issues uniquely numbered pickup tokens.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct TokenIssuer {
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn ShopDirectory>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    numbers: Arc<dyn TokenNumberGenerator>,
    backlog: QueueBacklogReader,
    policy: IssuancePolicy,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(collaborators: &Collaborators, policy: IssuancePolicy) -> Self {
        Self {
            identity: Arc::clone(&collaborators.identity),
            directory: Arc::clone(&collaborators.directory),
            store: Arc::clone(&collaborators.store),
            clock: Arc::clone(&collaborators.clock),
            numbers: Arc::clone(&collaborators.numbers),
            backlog: QueueBacklogReader::new(
                Arc::clone(&collaborators.store),
                policy.upstream_timeout,
            ),
            policy,
        }
    }

    /// Issue a token for the authenticated caller.
    ///
    /// Nothing is written unless every check passes. On success exactly one
    /// token row exists for the returned number.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the credential is missing or unknown
    /// - `ShopNotFound` / `ShopInactive` for unknown or disabled shops, also
    ///   when the shop closes between the lookup and the insert
    /// - `InvalidInput` for a negative distance or malformed coordinates
    /// - `TokenCreationFailed` if the insert fails or every candidate number
    ///   collides
    /// - `Timeout` / `UpstreamUnavailable` if a collaborator does not answer
    #[instrument(skip_all, fields(shop_id = %request.shop_id))]
    pub async fn issue(
        &self,
        credential: Option<&BearerToken>,
        request: IssueRequest,
    ) -> Result<IssuedToken, TokenError> {
        let timeout = self.policy.upstream_timeout;
        let customer_id = authenticate(&*self.identity, credential, timeout).await?;

        let shop = self.lookup_shop(&request.shop_id).await?;
        if !shop.is_active {
            return Err(TokenError::ShopInactive(shop.id));
        }

        if !request.distance_meters.is_finite() || request.distance_meters < 0.0 {
            return Err(TokenError::InvalidInput(
                "distance_meters must be a non-negative number".to_owned(),
            ));
        }
        let location = GeoPoint::new(request.customer_location.lat, request.customer_location.lng)?;

        let backlog = self.backlog.count(shop.id).await?;
        let now = self.clock.now();
        let eta = estimate_pickup(
            request.distance_meters,
            shop.average_service_time_minutes,
            backlog,
            now,
        )?;
        let queue_position = backlog.saturating_add(1);

        for attempt in 1..=self.policy.token_number_attempts {
            let token = Token {
                id: TokenId::generate(),
                token_number: self.numbers.generate(now),
                shop_id: shop.id,
                customer_id,
                customer_location: location,
                distance_meters: request.distance_meters,
                traffic_duration_minutes: eta.traffic_minutes,
                service_minutes: shop.average_service_time_minutes,
                queue_position: i64::try_from(queue_position).unwrap_or(i64::MAX),
                estimated_pickup_time: eta.pickup_time,
                status: TokenStatus::Pending,
                created_at: now,
                updated_at: now,
            };

            let inserted = bounded(timeout, "token_store.insert", self.store.insert(&token))
                .await
                .inspect_err(|_| {
                    error!(
                        token_id = %token.id,
                        token_number = %token.token_number,
                        "Insert timed out; the row may have been written"
                    );
                })?;
            match inserted {
                Ok(()) => {
                    info!(
                        token_number = %token.token_number,
                        distance_meters = token.distance_meters,
                        traffic_minutes = eta.traffic_minutes,
                        queue_wait_minutes = eta.wait_minutes,
                        total_minutes = eta.total_minutes,
                        queue_position,
                        attempt,
                        "Token issued"
                    );
                    return Ok(IssuedToken {
                        token,
                        queue_position,
                        eta,
                    });
                }
                Err(RepositoryError::ShopInactive) => {
                    warn!("Shop closed before the insert");
                    return Err(TokenError::ShopInactive(shop.id));
                }
                Err(RepositoryError::Conflict(reason)) => {
                    warn!(attempt, %reason, "Token number collision, regenerating");
                }
                Err(e) => {
                    error!(error = %e, "Token creation error");
                    return Err(TokenError::TokenCreationFailed);
                }
            }
        }

        error!(
            attempts = self.policy.token_number_attempts,
            "Exhausted token number attempts"
        );
        Err(TokenError::TokenCreationFailed)
    }

    async fn lookup_shop(&self, raw_id: &str) -> Result<Shop, TokenError> {
        let Ok(shop_id) = raw_id.trim().parse::<ShopId>() else {
            return Err(TokenError::ShopNotFound(raw_id.to_owned()));
        };
        call(
            self.policy.upstream_timeout,
            "shop_directory.get",
            self.directory.get(shop_id),
        )
        .await?
        .ok_or_else(|| TokenError::ShopNotFound(raw_id.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    use pickup_core::{TokenNumber, UserId};

    use super::*;
    use crate::models::ShopSummary;
    use crate::services::memory::{FixedClock, MemoryFixture, MemoryTokenStore, sample_token};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap()
    }

    fn request(shop_id: ShopId, distance_meters: f64) -> IssueRequest {
        IssueRequest {
            shop_id: shop_id.to_string(),
            customer_location: Coordinates {
                lat: 12.9716,
                lng: 77.5946,
            },
            distance_meters,
        }
    }

    /// Hands out queued numbers first, then random ones.
    struct ScriptedNumbers(Mutex<VecDeque<TokenNumber>>);

    impl TokenNumberGenerator for ScriptedNumbers {
        fn generate(&self, now: DateTime<Utc>) -> TokenNumber {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| TokenNumber::generate(now, &mut rand::rng()))
        }
    }

    /// Always hands out the same number.
    struct StuckNumbers(TokenNumber);

    impl TokenNumberGenerator for StuckNumbers {
        fn generate(&self, _now: DateTime<Utc>) -> TokenNumber {
            self.0.clone()
        }
    }

    struct SlowDirectory;

    #[async_trait]
    impl ShopDirectory for SlowDirectory {
        async fn get(&self, _id: ShopId) -> Result<Option<Shop>, RepositoryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
    }

    /// Keeps answering with the shop as it was when first read.
    struct StaleDirectory(Shop);

    #[async_trait]
    impl ShopDirectory for StaleDirectory {
        async fn get(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError> {
            Ok((self.0.id == id).then(|| self.0.clone()))
        }
    }

    /// Delegates to a memory store, but never finishes an insert in time.
    struct SlowInsertStore(Arc<MemoryTokenStore>);

    #[async_trait]
    impl TokenStore for SlowInsertStore {
        async fn insert(&self, token: &Token) -> Result<(), RepositoryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.0.insert(token).await
        }

        async fn count_backlog(&self, shop_id: ShopId) -> Result<u64, RepositoryError> {
            self.0.count_backlog(shop_id).await
        }

        async fn get(&self, id: TokenId) -> Result<Option<Token>, RepositoryError> {
            self.0.get(id).await
        }

        async fn update_status(
            &self,
            actor: UserId,
            id: TokenId,
            expected: TokenStatus,
            next: TokenStatus,
            at: DateTime<Utc>,
        ) -> Result<Option<Token>, RepositoryError> {
            self.0.update_status(actor, id, expected, next, at).await
        }

        async fn list_for_customer(
            &self,
            customer_id: UserId,
            limit: u32,
        ) -> Result<Vec<Token>, RepositoryError> {
            self.0.list_for_customer(customer_id, limit).await
        }

        async fn list_for_shop(
            &self,
            actor: UserId,
            shop_id: ShopId,
            limit: u32,
        ) -> Result<Vec<Token>, RepositoryError> {
            self.0.list_for_shop(actor, shop_id, limit).await
        }

        async fn shop_summary(
            &self,
            actor: UserId,
            shop_id: ShopId,
        ) -> Result<ShopSummary, RepositoryError> {
            self.0.shop_summary(actor, shop_id).await
        }

        async fn ping(&self) -> Result<(), RepositoryError> {
            self.0.ping().await
        }
    }

    fn issuer(fixture: &MemoryFixture) -> TokenIssuer {
        TokenIssuer::new(
            &fixture.collaborators(Arc::new(FixedClock(now()))),
            IssuancePolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let fixture = MemoryFixture::new().await;
        let shop = fixture.add_shop(5, true).await;
        let issued = issuer(&fixture)
            .issue(Some(&fixture.customer_credential()), request(shop.id, 3000.0))
            .await
            .unwrap();

        assert_eq!(issued.token.traffic_duration_minutes, 9);
        assert_eq!(issued.queue_position, 1);
        assert_eq!(issued.token.created_at, now());
        assert_eq!(
            issued.token.estimated_pickup_time,
            issued.token.created_at + TimeDelta::minutes(14)
        );
        assert_eq!(issued.token.status, TokenStatus::Pending);
        assert_eq!(issued.token.customer_id, fixture.customer);
        assert_eq!(fixture.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_backlog_extends_wait_and_position() {
        let fixture = MemoryFixture::new().await;
        let shop = fixture.add_shop(10, true).await;
        fixture.store.seed(sample_token(shop.id, TokenStatus::Pending)).await;
        fixture.store.seed(sample_token(shop.id, TokenStatus::Preparing)).await;
        fixture.store.seed(sample_token(shop.id, TokenStatus::Served)).await;

        let issued = issuer(&fixture)
            .issue(Some(&fixture.customer_credential()), request(shop.id, 2000.0))
            .await
            .unwrap();

        assert_eq!(issued.queue_position, 3);
        assert_eq!(issued.eta.traffic_minutes, 6);
        assert_eq!(issued.eta.wait_minutes, 20);
        assert_eq!(issued.eta.total_minutes, 36);
        assert_eq!(issued.token.queue_position, 3);
    }

    #[tokio::test]
    async fn test_missing_or_unknown_credentials() {
        let fixture = MemoryFixture::new().await;
        let shop = fixture.add_shop(5, true).await;
        let issuer = issuer(&fixture);

        let err = issuer.issue(None, request(shop.id, 10.0)).await.unwrap_err();
        assert_eq!(err, TokenError::Unauthorized);

        let stranger = BearerToken::new("nobody");
        let err = issuer
            .issue(Some(&stranger), request(shop.id, 10.0))
            .await
            .unwrap_err();
        assert_eq!(err, TokenError::Unauthorized);
        assert!(fixture.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_shop() {
        let fixture = MemoryFixture::new().await;
        let issuer = issuer(&fixture);
        let credential = fixture.customer_credential();

        let err = issuer
            .issue(Some(&credential), request(ShopId::generate(), 10.0))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::ShopNotFound(_)));

        let mut bad = request(ShopId::generate(), 10.0);
        bad.shop_id = "corner-bakery".to_owned();
        let err = issuer.issue(Some(&credential), bad).await.unwrap_err();
        assert_eq!(err, TokenError::ShopNotFound("corner-bakery".to_owned()));
    }

    #[tokio::test]
    async fn test_inactive_shop_writes_nothing() {
        let fixture = MemoryFixture::new().await;
        let shop = fixture.add_shop(5, false).await;
        let err = issuer(&fixture)
            .issue(Some(&fixture.customer_credential()), request(shop.id, 10.0))
            .await
            .unwrap_err();
        assert_eq!(err, TokenError::ShopInactive(shop.id));
        assert!(fixture.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_shop_closed_after_directory_read_is_rejected() {
        let fixture = MemoryFixture::new().await;
        let shop = fixture.add_shop(5, true).await;
        let mut collaborators = fixture.collaborators(Arc::new(FixedClock(now())));
        collaborators.directory = Arc::new(StaleDirectory(shop.clone()));
        let issuer = TokenIssuer::new(&collaborators, IssuancePolicy::default());

        fixture.set_shop_active(shop.id, false).await;

        let err = issuer
            .issue(Some(&fixture.customer_credential()), request(shop.id, 10.0))
            .await
            .unwrap_err();
        assert_eq!(err, TokenError::ShopInactive(shop.id));
        assert!(fixture.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_slow_insert_times_out() {
        let fixture = MemoryFixture::new().await;
        let shop = fixture.add_shop(5, true).await;
        let mut collaborators = fixture.collaborators(Arc::new(FixedClock(now())));
        collaborators.store = Arc::new(SlowInsertStore(Arc::clone(&fixture.store)));
        let issuer = TokenIssuer::new(
            &collaborators,
            IssuancePolicy {
                upstream_timeout: Duration::from_millis(20),
                ..IssuancePolicy::default()
            },
        );

        let err = issuer
            .issue(Some(&fixture.customer_credential()), request(shop.id, 10.0))
            .await
            .unwrap_err();
        assert_eq!(err, TokenError::Timeout("token_store.insert"));
    }

    #[tokio::test]
    async fn test_invalid_distance_and_coordinates() {
        let fixture = MemoryFixture::new().await;
        let shop = fixture.add_shop(5, true).await;
        let issuer = issuer(&fixture);
        let credential = fixture.customer_credential();

        let err = issuer
            .issue(Some(&credential), request(shop.id, -1.0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");

        let mut off_planet = request(shop.id, 10.0);
        off_planet.customer_location.lat = 123.0;
        let err = issuer.issue(Some(&credential), off_planet).await.unwrap_err();
        assert_eq!(err.code(), "invalid_input");
        assert!(fixture.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_collision_is_retried_with_fresh_number() {
        let fixture = MemoryFixture::new().await;
        let shop = fixture.add_shop(5, true).await;
        let taken = sample_token(shop.id, TokenStatus::Served);
        fixture.store.seed(taken.clone()).await;

        let mut collaborators = fixture.collaborators(Arc::new(FixedClock(now())));
        collaborators.numbers = Arc::new(ScriptedNumbers(Mutex::new(VecDeque::from([
            taken.token_number.clone(),
            taken.token_number.clone(),
        ]))));
        let issuer = TokenIssuer::new(&collaborators, IssuancePolicy::default());

        let issued = issuer
            .issue(Some(&fixture.customer_credential()), request(shop.id, 10.0))
            .await
            .unwrap();
        assert_ne!(issued.token.token_number, taken.token_number);
        assert_eq!(fixture.store.len().await, 2);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_fail() {
        let fixture = MemoryFixture::new().await;
        let shop = fixture.add_shop(5, true).await;
        let taken = sample_token(shop.id, TokenStatus::Served);
        fixture.store.seed(taken.clone()).await;

        let mut collaborators = fixture.collaborators(Arc::new(FixedClock(now())));
        collaborators.numbers = Arc::new(StuckNumbers(taken.token_number));
        let issuer = TokenIssuer::new(
            &collaborators,
            IssuancePolicy {
                token_number_attempts: 3,
                ..IssuancePolicy::default()
            },
        );

        let err = issuer
            .issue(Some(&fixture.customer_credential()), request(shop.id, 10.0))
            .await
            .unwrap_err();
        assert_eq!(err, TokenError::TokenCreationFailed);
        assert_eq!(fixture.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_slow_directory_times_out() {
        let fixture = MemoryFixture::new().await;
        let mut collaborators = fixture.collaborators(Arc::new(FixedClock(now())));
        collaborators.directory = Arc::new(SlowDirectory);
        let issuer = TokenIssuer::new(
            &collaborators,
            IssuancePolicy {
                upstream_timeout: Duration::from_millis(20),
                ..IssuancePolicy::default()
            },
        );

        let err = issuer
            .issue(
                Some(&fixture.customer_credential()),
                request(ShopId::generate(), 10.0),
            )
            .await
            .unwrap_err();
        assert_eq!(err, TokenError::Timeout("shop_directory.get"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_issues_get_distinct_numbers() {
        let fixture = MemoryFixture::new().await;
        let shop = fixture.add_shop(3, true).await;
        let issuer = issuer(&fixture);

        let mut handles = Vec::new();
        for i in 0..100 {
            let issuer = issuer.clone();
            let user = UserId::generate();
            let raw = format!("customer-{i}");
            fixture.identity.register(&raw, user).await;
            let request = request(shop.id, 500.0);
            handles.push(tokio::spawn(async move {
                issuer
                    .issue(Some(&BearerToken::new(raw)), request)
                    .await
            }));
        }

        let mut numbers = HashSet::new();
        for handle in handles {
            let issued = handle.await.unwrap().unwrap();
            assert!(issued.queue_position >= 1);
            numbers.insert(issued.token.token_number);
        }
        assert_eq!(numbers.len(), 100);
        assert_eq!(fixture.store.len().await, 100);
    }
}
