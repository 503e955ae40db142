//! Decoding of scanned QR payloads.
//!
//! Customer QR codes either carry the bare token UUID or a small JSON object
//! such as `{"token_id": "...", "token_number": "TKN-..."}`. Older codes used
//! `id` instead of `token_id`.

use serde::Deserialize;

use super::id::TokenId;

/// Errors that can occur when decoding a scanned payload.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanPayloadError {
    /// Nothing was scanned.
    #[error("scanned payload is empty")]
    Empty,
    /// The payload looked like JSON but did not parse.
    #[error("scanned payload is not valid JSON")]
    InvalidJson,
    /// JSON payload without `token_id` or `id`.
    #[error("scanned payload does not contain a token id")]
    MissingTokenId,
    /// The token id is not a UUID.
    #[error("scanned token id is not a valid identifier")]
    InvalidTokenId,
}

#[derive(Deserialize)]
struct EmbeddedToken {
    token_id: Option<String>,
    id: Option<String>,
}

/// Extract the token ID from a scanned code.
///
/// # Errors
///
/// Returns an error if the payload is empty, is malformed JSON, lacks an id,
/// or the id is not a UUID.
pub fn parse_scan_payload(raw: &str) -> Result<TokenId, ScanPayloadError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ScanPayloadError::Empty);
    }

    let candidate = if raw.starts_with('{') {
        let embedded: EmbeddedToken =
            serde_json::from_str(raw).map_err(|_| ScanPayloadError::InvalidJson)?;
        embedded
            .token_id
            .or(embedded.id)
            .ok_or(ScanPayloadError::MissingTokenId)?
    } else {
        raw.to_owned()
    };

    candidate
        .trim()
        .parse()
        .map_err(|_| ScanPayloadError::InvalidTokenId)
}
