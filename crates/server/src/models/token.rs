//! Token domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pickup_core::{EtaEstimate, GeoPoint, ShopId, TokenId, TokenNumber, TokenStatus, UserId};

/// A customer's place in a shop's pickup queue.
///
/// Everything except `status` and `updated_at` is fixed at issuance.
/// `created_at` is the instant the estimate was computed for, so
/// `estimated_pickup_time` can be recomputed from the stored inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub token_number: TokenNumber,
    pub shop_id: ShopId,
    pub customer_id: UserId,
    pub customer_location: GeoPoint,
    pub distance_meters: f64,
    pub traffic_duration_minutes: i64,
    /// Shop service time in effect at issuance.
    pub service_minutes: i32,
    /// Backlog at issuance plus one. Informational only.
    pub queue_position: i64,
    pub estimated_pickup_time: DateTime<Utc>,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A freshly issued token together with how it was estimated.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    pub token: Token,
    /// Backlog snapshot plus one. Two concurrent issues can report the same
    /// position; only the token number is guaranteed unique.
    pub queue_position: u64,
    pub eta: EtaEstimate,
}

/// Token counts per status for one shop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopSummary {
    pub pending: u64,
    pub preparing: u64,
    pub served: u64,
    pub cancelled: u64,
}

impl ShopSummary {
    /// Tokens still waiting to be served.
    #[must_use]
    pub const fn backlog(&self) -> u64 {
        self.pending + self.preparing
    }

    /// All tokens ever issued for the shop.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.pending + self.preparing + self.served + self.cancelled
    }
}
