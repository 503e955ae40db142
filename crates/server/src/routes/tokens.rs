//! Token issuance and lifecycle routes.

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use pickup_core::{TokenId, TokenNumber, TokenStatus};

use crate::error::{AppError, Result};
use crate::middleware::Credentials;
use crate::models::{IssuedToken, Token};
use crate::services::IssueRequest;
use crate::state::AppState;

/// Create the token routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(issue))
        .route("/mine", get(mine))
        .route("/scan", post(scan))
        .route("/{id}/preparing", post(start_preparing))
        .route("/{id}/served", post(mark_served))
        .route("/{id}/cancel", post(cancel))
}

/// Body returned after a successful issue.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueResponse {
    pub token_id: TokenId,
    pub token_number: TokenNumber,
    pub status: TokenStatus,
    pub estimated_pickup_time: DateTime<Utc>,
    pub traffic_duration_minutes: i64,
    pub queue_wait_minutes: i64,
    pub queue_position: u64,
    pub created_at: DateTime<Utc>,
}

impl From<IssuedToken> for IssueResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token_id: issued.token.id,
            token_number: issued.token.token_number,
            status: issued.token.status,
            estimated_pickup_time: issued.token.estimated_pickup_time,
            traffic_duration_minutes: issued.eta.traffic_minutes,
            queue_wait_minutes: issued.eta.wait_minutes,
            queue_position: issued.queue_position,
            created_at: issued.token.created_at,
        }
    }
}

/// Scanned QR code contents.
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub payload: String,
}

/// Issue a token.
///
/// Runs on its own task so a client hanging up cannot cancel the issue
/// between the insert and the response.
async fn issue(
    State(state): State<AppState>,
    credentials: Credentials,
    body: std::result::Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Json<IssueResponse>> {
    let Json(request) = body?;
    let issuer = state.issuer().clone();

    let issued = tokio::spawn(
        async move { issuer.issue(credentials.bearer(), request).await }
            .instrument(tracing::Span::current()),
    )
    .await
    .map_err(|e| AppError::Internal(format!("issue task failed: {e}")))??;

    Ok(Json(issued.into()))
}

async fn mine(State(state): State<AppState>, credentials: Credentials) -> Result<Json<Vec<Token>>> {
    let tokens = state.queries().my_tokens(credentials.bearer()).await?;
    Ok(Json(tokens))
}

async fn scan(
    State(state): State<AppState>,
    credentials: Credentials,
    body: std::result::Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<Token>> {
    let Json(scan) = body?;
    let token = state
        .lifecycle()
        .mark_served_from_scan(credentials.bearer(), &scan.payload)
        .await?;
    Ok(Json(token))
}

async fn start_preparing(
    State(state): State<AppState>,
    credentials: Credentials,
    id: std::result::Result<Path<TokenId>, PathRejection>,
) -> Result<Json<Token>> {
    let Path(id) = id?;
    let token = state
        .lifecycle()
        .start_preparing(credentials.bearer(), id)
        .await?;
    Ok(Json(token))
}

async fn mark_served(
    State(state): State<AppState>,
    credentials: Credentials,
    id: std::result::Result<Path<TokenId>, PathRejection>,
) -> Result<Json<Token>> {
    let Path(id) = id?;
    let token = state.lifecycle().mark_served(credentials.bearer(), id).await?;
    Ok(Json(token))
}

async fn cancel(
    State(state): State<AppState>,
    credentials: Credentials,
    id: std::result::Result<Path<TokenId>, PathRejection>,
) -> Result<Json<Token>> {
    let Path(id) = id?;
    let token = state.lifecycle().cancel(credentials.bearer(), id).await?;
    Ok(Json(token))
}
