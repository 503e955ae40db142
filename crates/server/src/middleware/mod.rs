//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `CorsLayer` (answers preflights before anything else runs)
//! 3. `TraceLayer` (request span)
//! 4. Request ID (recorded into the trace span)
//!
//! Authentication is not a layer. Handlers take [`Credentials`] and the token
//! services decide whether a missing credential matters.

pub mod auth;
pub mod request_id;

pub use auth::Credentials;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
