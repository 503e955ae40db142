//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET     /health                     - Liveness
//! GET     /health/ready               - Readiness (token store ping)
//!
//! # Tokens
//! POST    /api/tokens                 - Issue a token (customer)
//! OPTIONS /api/tokens                 - CORS preflight
//! GET     /api/tokens/mine            - Caller's tokens
//! POST    /api/tokens/scan            - Mark served from a scanned QR payload
//! POST    /api/tokens/{id}/preparing  - Start preparing (shop staff)
//! POST    /api/tokens/{id}/served     - Mark served (shop staff)
//! POST    /api/tokens/{id}/cancel     - Cancel (customer or shop staff)
//!
//! # Shops
//! GET     /api/shops/{id}/queue       - Backlog and next position (public)
//! GET     /api/shops/{id}/tokens      - 50 most recent tokens (shop staff)
//! GET     /api/shops/{id}/summary     - Counts per status (shop staff)
//! ```

pub mod shops;
pub mod tokens;

use axum::{
    Router,
    extract::{Request, State},
    http::{
        HeaderName, Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::get,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info_span;

use crate::error::AppError;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// CORS policy for browser clients: any origin, the headers browser SDKs send.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            CONTENT_TYPE,
        ])
}

/// Create the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/tokens", tokens::routes())
        .nest("/api/shops", shops::routes())
        .fallback(not_found)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(cors_layer())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the token store does not answer in time.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let ping = tokio::time::timeout(state.config().upstream_timeout, state.store().ping()).await;
    match ping {
        Ok(Ok(())) => StatusCode::OK,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
        Err(_) => {
            tracing::warn!("Readiness check timed out");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn not_found() -> AppError {
    AppError::NotFound
}
