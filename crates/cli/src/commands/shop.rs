//! Shop management commands.

use pickup_core::ShopId;
use pickup_server::db::shops;

use super::{CommandError, connect};

/// Open or close a shop for new tokens.
///
/// Closing takes effect on the next issue request: the token insert
/// re-checks the flag in the database.
///
/// # Errors
///
/// Returns an error if the shop does not exist or the update fails.
pub async fn set_active(shop: ShopId, is_active: bool) -> Result<(), CommandError> {
    let pool = connect().await?;

    shops::set_active(&pool, shop, is_active).await?;

    tracing::info!(shop_id = %shop, is_active, "Shop updated");
    Ok(())
}
