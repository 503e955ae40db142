//! Shop directory backed by `pickup.shop`.
//!
//! Caches active shop rows using `moka`. Inactive rows are never cached, so
//! reopening a shop takes effect at once. Closing one is enforced by the
//! token insert, which re-checks `is_active` in the database.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use pickup_core::{ShopId, UserId};

use super::RepositoryError;
use crate::models::Shop;
use crate::services::ShopDirectory;

#[derive(Debug, sqlx::FromRow)]
struct ShopRow {
    id: ShopId,
    owner_id: UserId,
    name: String,
    average_service_time: i32,
    is_active: bool,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            average_service_time_minutes: row.average_service_time,
            is_active: row.is_active,
        }
    }
}

/// `PostgreSQL` shop directory with a short-lived read cache.
#[derive(Clone)]
pub struct PgShopDirectory {
    pool: PgPool,
    cache: Option<Cache<ShopId, Shop>>,
}

impl PgShopDirectory {
    /// Create a directory caching rows for `ttl`. A zero TTL disables caching.
    #[must_use]
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        let cache = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build()
        });
        Self { pool, cache }
    }
}

#[async_trait]
impl ShopDirectory for PgShopDirectory {
    #[instrument(skip(self), fields(shop_id = %id))]
    async fn get(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError> {
        if let Some(cache) = &self.cache
            && let Some(shop) = cache.get(&id).await
        {
            debug!("Cache hit for shop");
            return Ok(Some(shop));
        }

        let row = sqlx::query_as::<_, ShopRow>(
            r"
            SELECT id, owner_id, name, average_service_time, is_active
            FROM pickup.shop
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let shop = row.map(Shop::from);
        if let (Some(cache), Some(shop)) = (&self.cache, &shop)
            && shop.is_active
        {
            cache.insert(id, shop.clone()).await;
        }
        Ok(shop)
    }
}

/// Open or close a shop for new tokens.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the shop does not exist.
pub async fn set_active(pool: &PgPool, id: ShopId, is_active: bool) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE pickup.shop
        SET is_active = $2, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(is_active)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_maps_service_time() {
        let row = ShopRow {
            id: ShopId::generate(),
            owner_id: UserId::generate(),
            name: "Corner Bakery".to_owned(),
            average_service_time: 7,
            is_active: false,
        };
        let shop = Shop::from(row);
        assert_eq!(shop.average_service_time_minutes, 7);
        assert!(!shop.is_active);
    }
}
