//! Bearer credential extraction.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::services::BearerToken;

/// The caller's bearer token, if the request carried one.
///
/// Never rejects. A missing or non-bearer `Authorization` header yields
/// `None`, which the token services answer with `Unauthorized`.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(credentials: Credentials) -> impl IntoResponse {
///     state.queries().my_tokens(credentials.bearer()).await
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Credentials(pub Option<BearerToken>);

impl Credentials {
    #[must_use]
    pub const fn bearer(&self) -> Option<&BearerToken> {
        self.0.as_ref()
    }
}

fn parse_authorization(value: &str) -> Option<BearerToken> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| BearerToken::new(token))
}

impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_authorization);
        Ok(Self(bearer))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_authorization() {
        assert_eq!(parse_authorization("Bearer abc").unwrap().expose(), "abc");
        assert_eq!(parse_authorization("bearer  abc ").unwrap().expose(), "abc");
        assert!(parse_authorization("Basic dXNlcjpwYXNz").is_none());
        assert!(parse_authorization("Bearer ").is_none());
        assert!(parse_authorization("abc").is_none());
    }
}
