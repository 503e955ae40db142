//! Human-facing token numbers.

use core::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "TKN";
const SUFFIX_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Errors that can occur when parsing a [`TokenNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenNumberError {
    /// The input does not have the `TKN-<millis>-<suffix>` shape.
    #[error("token number must look like TKN-<millis>-<suffix>")]
    Malformed,
    /// The timestamp component is not a non-negative integer.
    #[error("token number timestamp is invalid")]
    InvalidTimestamp,
    /// The suffix has the wrong length or characters outside `[0-9A-Z]`.
    #[error("token number suffix must be {len} characters of [0-9A-Z]")]
    InvalidSuffix {
        /// Required suffix length.
        len: usize,
    },
}

/// A token number such as `TKN-1760781600000-7Q2M0ZK4A`.
///
/// The middle component is the issuing instant in Unix milliseconds, which
/// keeps numbers roughly time-ordered. The random base36 suffix separates
/// tokens issued within the same millisecond. Uniqueness is ultimately
/// enforced by the store's unique constraint; callers regenerate on conflict.
///
/// ## Examples
///
/// ```
/// use pickup_core::TokenNumber;
///
/// let number = TokenNumber::parse("TKN-1760781600000-7Q2M0ZK4A").unwrap();
/// assert_eq!(number.issued_millis(), 1_760_781_600_000);
/// assert!(TokenNumber::parse("TKN-12-short").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenNumber(String);

impl TokenNumber {
    /// Length of the random suffix.
    pub const SUFFIX_LEN: usize = 9;

    /// Generate a fresh candidate for the given issuing instant.
    #[must_use]
    pub fn generate<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix: String = (0..Self::SUFFIX_LEN)
            .map(|_| {
                let idx = rng.random_range(0..SUFFIX_ALPHABET.len());
                char::from(SUFFIX_ALPHABET.get(idx).copied().unwrap_or(b'0'))
            })
            .collect();
        Self(format!("{PREFIX}-{}-{suffix}", now.timestamp_millis()))
    }

    /// Parse a `TokenNumber` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix, timestamp or suffix is malformed.
    pub fn parse(s: &str) -> Result<Self, TokenNumberError> {
        let mut parts = s.splitn(3, '-');
        let (Some(PREFIX), Some(millis), Some(suffix)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenNumberError::Malformed);
        };

        if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenNumberError::InvalidTimestamp);
        }
        millis
            .parse::<i64>()
            .map_err(|_| TokenNumberError::InvalidTimestamp)?;

        if suffix.len() != Self::SUFFIX_LEN || !suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b))
        {
            return Err(TokenNumberError::InvalidSuffix {
                len: Self::SUFFIX_LEN,
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Issuing instant encoded in the number, in Unix milliseconds.
    #[must_use]
    pub fn issued_millis(&self) -> i64 {
        self.0
            .split('-')
            .nth(1)
            .and_then(|m| m.parse().ok())
            .unwrap_or_default()
    }

    /// Returns the token number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `TokenNumber` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TokenNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TokenNumber {
    type Error = TokenNumberError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TokenNumber> for String {
    fn from(number: TokenNumber) -> Self {
        number.0
    }
}

impl std::str::FromStr for TokenNumber {
    type Err = TokenNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for TokenNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for TokenNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TokenNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for TokenNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
