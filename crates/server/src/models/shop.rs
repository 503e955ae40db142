//! Shop metadata as seen by the token service.

use serde::{Deserialize, Serialize};

use pickup_core::{ShopId, UserId};

/// A shop that customers can queue at.
///
/// Owned by the shop directory; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    /// Unique shop ID.
    pub id: ShopId,
    /// User who owns the shop.
    pub owner_id: UserId,
    /// Display name.
    pub name: String,
    /// Minutes the shop needs to prepare one order.
    pub average_service_time_minutes: i32,
    /// Inactive shops reject new tokens.
    pub is_active: bool,
}
