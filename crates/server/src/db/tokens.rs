//! Token repository backed by `pickup.token`.
//!
//! Queries use runtime-checked `query_as` with `FromRow` rows. Access checks
//! and the status compare-and-set run inside one transaction holding a row
//! lock, so concurrent scans of the same token serialize here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use pickup_core::{GeoPoint, ShopId, TokenId, TokenNumber, TokenStatus, UserId};

use super::RepositoryError;
use crate::models::{ShopSummary, Token};
use crate::services::TokenStore;

macro_rules! token_columns {
    () => {
        "id, token_number, shop_id, customer_id, customer_lat, customer_lng, \
         distance_meters, traffic_duration_minutes, service_minutes, queue_position, \
         estimated_pickup_time, status, created_at, updated_at"
    };
}

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    id: TokenId,
    token_number: String,
    shop_id: ShopId,
    customer_id: UserId,
    customer_lat: f64,
    customer_lng: f64,
    distance_meters: f64,
    traffic_duration_minutes: i64,
    service_minutes: i32,
    queue_position: i64,
    estimated_pickup_time: DateTime<Utc>,
    status: TokenStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for Token {
    type Error = RepositoryError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let token_number = TokenNumber::parse(&row.token_number).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid token number in database: {e}"))
        })?;
        let customer_location = GeoPoint::new(row.customer_lat, row.customer_lng).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid location in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            token_number,
            shop_id: row.shop_id,
            customer_id: row.customer_id,
            customer_location,
            distance_meters: row.distance_meters,
            traffic_duration_minutes: row.traffic_duration_minutes,
            service_minutes: row.service_minutes,
            queue_position: row.queue_position,
            estimated_pickup_time: row.estimated_pickup_time,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    pending: i64,
    preparing: i64,
    served: i64,
    cancelled: i64,
}

fn non_negative(count: i64) -> Result<u64, RepositoryError> {
    u64::try_from(count)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative count: {count}")))
}

/// Whether `actor` owns or staffs `shop_id`.
async fn can_manage(
    conn: &mut PgConnection,
    actor: UserId,
    shop_id: ShopId,
) -> Result<bool, RepositoryError> {
    let allowed = sqlx::query_scalar::<_, bool>(
        r"
        SELECT EXISTS (
            SELECT 1 FROM pickup.shop WHERE id = $1 AND owner_id = $2
            UNION ALL
            SELECT 1 FROM pickup.shop_staff WHERE shop_id = $1 AND user_id = $2
        )
        ",
    )
    .bind(shop_id)
    .bind(actor)
    .fetch_one(conn)
    .await?;

    Ok(allowed)
}

fn forbidden(actor: UserId, shop_id: ShopId) -> RepositoryError {
    RepositoryError::Forbidden(format!("user {actor} cannot manage shop {shop_id}"))
}

/// `PostgreSQL` token store.
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    #[instrument(skip(self, token), fields(token_number = %token.token_number))]
    async fn insert(&self, token: &Token) -> Result<(), RepositoryError> {
        // is_active is re-read here; the directory's copy may be cached.
        let result = sqlx::query(concat!(
            "INSERT INTO pickup.token (",
            token_columns!(),
            ") SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14 ",
            "WHERE EXISTS (SELECT 1 FROM pickup.shop WHERE id = $3 AND is_active)"
        ))
        .bind(token.id)
        .bind(&token.token_number)
        .bind(token.shop_id)
        .bind(token.customer_id)
        .bind(token.customer_location.lat())
        .bind(token.customer_location.lng())
        .bind(token.distance_meters)
        .bind(token.traffic_duration_minutes)
        .bind(token.service_minutes)
        .bind(token.queue_position)
        .bind(token.estimated_pickup_time)
        .bind(token.status)
        .bind(token.created_at)
        .bind(token.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "token"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::ShopInactive);
        }
        Ok(())
    }

    async fn count_backlog(&self, shop_id: ShopId) -> Result<u64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*)
            FROM pickup.token
            WHERE shop_id = $1 AND status IN ('pending', 'preparing')
            ",
        )
        .bind(shop_id)
        .fetch_one(&self.pool)
        .await?;

        non_negative(count)
    }

    async fn get(&self, id: TokenId) -> Result<Option<Token>, RepositoryError> {
        let row = sqlx::query_as::<_, TokenRow>(concat!(
            "SELECT ",
            token_columns!(),
            " FROM pickup.token WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Token::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        actor: UserId,
        id: TokenId,
        expected: TokenStatus,
        next: TokenStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Token>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_as::<_, (ShopId, UserId, TokenStatus)>(
            "SELECT shop_id, customer_id, status FROM pickup.token WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((shop_id, customer_id, current)) = locked else {
            return Err(RepositoryError::NotFound);
        };

        let own_cancel = next == TokenStatus::Cancelled && customer_id == actor;
        if !own_cancel && !can_manage(&mut tx, actor, shop_id).await? {
            return Err(forbidden(actor, shop_id));
        }
        if current != expected {
            return Ok(None);
        }

        let row = if expected == next {
            sqlx::query_as::<_, TokenRow>(concat!(
                "SELECT ",
                token_columns!(),
                " FROM pickup.token WHERE id = $1"
            ))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as::<_, TokenRow>(concat!(
                "UPDATE pickup.token SET status = $2, updated_at = $3 WHERE id = $1 RETURNING ",
                token_columns!()
            ))
            .bind(id)
            .bind(next)
            .bind(at)
            .fetch_one(&mut *tx)
            .await?
        };
        tx.commit().await?;

        Token::try_from(row).map(Some)
    }

    async fn list_for_customer(
        &self,
        customer_id: UserId,
        limit: u32,
    ) -> Result<Vec<Token>, RepositoryError> {
        let rows = sqlx::query_as::<_, TokenRow>(concat!(
            "SELECT ",
            token_columns!(),
            " FROM pickup.token WHERE customer_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(customer_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Token::try_from).collect()
    }

    async fn list_for_shop(
        &self,
        actor: UserId,
        shop_id: ShopId,
        limit: u32,
    ) -> Result<Vec<Token>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        if !can_manage(&mut conn, actor, shop_id).await? {
            return Err(forbidden(actor, shop_id));
        }

        let rows = sqlx::query_as::<_, TokenRow>(concat!(
            "SELECT ",
            token_columns!(),
            " FROM pickup.token WHERE shop_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(shop_id)
        .bind(i64::from(limit))
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(Token::try_from).collect()
    }

    async fn shop_summary(
        &self,
        actor: UserId,
        shop_id: ShopId,
    ) -> Result<ShopSummary, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        if !can_manage(&mut conn, actor, shop_id).await? {
            return Err(forbidden(actor, shop_id));
        }

        let row = sqlx::query_as::<_, SummaryRow>(
            r"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'preparing') AS preparing,
                COUNT(*) FILTER (WHERE status = 'served') AS served,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled
            FROM pickup.token
            WHERE shop_id = $1
            ",
        )
        .bind(shop_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(ShopSummary {
            pending: non_negative(row.pending)?,
            preparing: non_negative(row.preparing)?,
            served: non_negative(row.served)?,
            cancelled: non_negative(row.cancelled)?,
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row() -> TokenRow {
        let now = Utc::now();
        TokenRow {
            id: TokenId::generate(),
            token_number: "TKN-1760779800000-A1B2C3D4E".to_owned(),
            shop_id: ShopId::generate(),
            customer_id: UserId::generate(),
            customer_lat: 12.9716,
            customer_lng: 77.5946,
            distance_meters: 3000.0,
            traffic_duration_minutes: 9,
            service_minutes: 5,
            queue_position: 1,
            estimated_pickup_time: now + chrono::TimeDelta::minutes(14),
            status: TokenStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_converts_to_token() {
        let token = Token::try_from(row()).unwrap();
        assert_eq!(token.token_number.as_str(), "TKN-1760779800000-A1B2C3D4E");
        assert!((token.customer_location.lat() - 12.9716).abs() < f64::EPSILON);
        assert_eq!(token.status, TokenStatus::Pending);
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let mut bad_number = row();
        bad_number.token_number = "ABC".to_owned();
        assert!(matches!(
            Token::try_from(bad_number),
            Err(RepositoryError::DataCorruption(_))
        ));

        let mut bad_location = row();
        bad_location.customer_lng = 500.0;
        assert!(matches!(
            Token::try_from(bad_location),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_negative_count_is_corruption() {
        assert_eq!(non_negative(7).unwrap(), 7);
        assert!(matches!(
            non_negative(-1),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
