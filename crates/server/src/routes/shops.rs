//! Shop queue and dashboard routes.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    routing::get,
};
use serde::{Deserialize, Serialize};

use pickup_core::ShopId;

use crate::error::Result;
use crate::middleware::Credentials;
use crate::models::{ShopSummary, Token};
use crate::services::QueueSnapshot;
use crate::state::AppState;

/// Create the shop routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{id}/queue", get(queue))
        .route("/{id}/tokens", get(tokens))
        .route("/{id}/summary", get(summary))
}

/// Status counts with derived totals.
#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub shop_id: ShopId,
    pub pending: u64,
    pub preparing: u64,
    pub served: u64,
    pub cancelled: u64,
    pub backlog: u64,
    pub total: u64,
}

impl SummaryResponse {
    fn new(shop_id: ShopId, summary: ShopSummary) -> Self {
        Self {
            shop_id,
            pending: summary.pending,
            preparing: summary.preparing,
            served: summary.served,
            cancelled: summary.cancelled,
            backlog: summary.backlog(),
            total: summary.total(),
        }
    }
}

async fn queue(
    State(state): State<AppState>,
    id: std::result::Result<Path<ShopId>, PathRejection>,
) -> Result<Json<QueueSnapshot>> {
    let Path(id) = id?;
    Ok(Json(state.queries().queue_length(id).await?))
}

async fn tokens(
    State(state): State<AppState>,
    credentials: Credentials,
    id: std::result::Result<Path<ShopId>, PathRejection>,
) -> Result<Json<Vec<Token>>> {
    let Path(id) = id?;
    Ok(Json(state.queries().shop_tokens(credentials.bearer(), id).await?))
}

async fn summary(
    State(state): State<AppState>,
    credentials: Credentials,
    id: std::result::Result<Path<ShopId>, PathRejection>,
) -> Result<Json<SummaryResponse>> {
    let Path(id) = id?;
    let summary = state.queries().shop_summary(credentials.bearer(), id).await?;
    Ok(Json(SummaryResponse::new(id, summary)))
}
