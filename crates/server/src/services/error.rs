//! Error taxonomy at the orchestration boundary.

use thiserror::Error;

use pickup_core::{EtaError, GeoPointError, ScanPayloadError, ShopId, TokenId, TokenStatus};

use crate::db::RepositoryError;

/// Errors returned by [`super::TokenIssuer`], [`super::TokenLifecycle`] and
/// [`super::TokenQueries`].
///
/// The `Display` text is safe to show to callers. Downstream details are
/// logged where the error is produced and never carried in the message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not allowed to manage tokens for this shop")]
    Forbidden,

    #[error("Shop not found")]
    ShopNotFound(String),

    #[error("Shop is not accepting new tokens")]
    ShopInactive(ShopId),

    #[error("Token not found")]
    TokenNotFound(TokenId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to create token")]
    TokenCreationFailed,

    #[error("Token cannot move from {from} to {to}")]
    InvalidTransition { from: TokenStatus, to: TokenStatus },

    #[error("Upstream call timed out")]
    Timeout(&'static str),

    #[error("Upstream service unavailable")]
    UpstreamUnavailable(&'static str),
}

impl TokenError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::ShopNotFound(_) => "shop_not_found",
            Self::ShopInactive(_) => "shop_inactive",
            Self::TokenNotFound(_) => "token_not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::TokenCreationFailed => "token_creation_failed",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Timeout(_) => "timeout",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }

    /// Map a failed read or policy-checked call against `operation`.
    pub(crate) fn from_repository(operation: &'static str, err: &RepositoryError) -> Self {
        match err {
            RepositoryError::Forbidden(_) => Self::Forbidden,
            _ => {
                tracing::error!(operation, error = %err, "Upstream call failed");
                Self::UpstreamUnavailable(operation)
            }
        }
    }
}

impl From<EtaError> for TokenError {
    fn from(err: EtaError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<GeoPointError> for TokenError {
    fn from(err: GeoPointError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<ScanPayloadError> for TokenError {
    fn from(err: ScanPayloadError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_hide_upstream_details() {
        let err = TokenError::UpstreamUnavailable("token_store.insert");
        assert_eq!(err.to_string(), "Upstream service unavailable");
        assert_eq!(err.code(), "upstream_unavailable");
    }

    #[test]
    fn test_transition_message() {
        let err = TokenError::InvalidTransition {
            from: TokenStatus::Cancelled,
            to: TokenStatus::Served,
        };
        assert_eq!(err.to_string(), "Token cannot move from cancelled to served");
        assert_eq!(err.code(), "invalid_transition");
    }

    #[test]
    fn test_forbidden_passes_through() {
        let err = RepositoryError::Forbidden("not staff".to_owned());
        assert_eq!(
            TokenError::from_repository("token_store.list_for_shop", &err),
            TokenError::Forbidden
        );
    }

    #[test]
    fn test_eta_errors_are_invalid_input() {
        let err: TokenError = EtaError::NegativeDistance(-1.0).into();
        assert_eq!(err.code(), "invalid_input");
    }
}
