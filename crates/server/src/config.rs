//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PICKUP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `PICKUP_HOST` - Bind address (default: 127.0.0.1)
//! - `PICKUP_PORT` - Listen port (default: 3000)
//! - `PICKUP_UPSTREAM_TIMEOUT_MS` - Deadline for each collaborator call (default: 5000)
//! - `PICKUP_TOKEN_NUMBER_ATTEMPTS` - Token number retry budget (default: 5)
//! - `PICKUP_SHOP_CACHE_TTL_SECS` - Shop cache lifetime, 0 disables (default: 30)
//! - `PICKUP_LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::services::IssuancePolicy;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One flattened JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Server configuration.
///
/// `database_url` is a [`SecretString`], so `Debug` output never shows it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Deadline for each call to the identity provider, directory or store
    pub upstream_timeout: Duration,
    /// How many token numbers to try before failing an issue request
    pub token_number_attempts: u32,
    /// Lifetime of cached shop rows
    pub shop_cache_ttl: Duration,
    /// Log line format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let upstream_timeout_ms: u64 = parse_env_or_default("PICKUP_UPSTREAM_TIMEOUT_MS", 5000)?;
        if upstream_timeout_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PICKUP_UPSTREAM_TIMEOUT_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let token_number_attempts: u32 = parse_env_or_default("PICKUP_TOKEN_NUMBER_ATTEMPTS", 5)?;
        if token_number_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PICKUP_TOKEN_NUMBER_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url: get_database_url("PICKUP_DATABASE_URL")?,
            host: parse_env_or_default("PICKUP_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_env_or_default("PICKUP_PORT", 3000)?,
            upstream_timeout: Duration::from_millis(upstream_timeout_ms),
            token_number_attempts,
            shop_cache_ttl: Duration::from_secs(parse_env_or_default(
                "PICKUP_SHOP_CACHE_TTL_SECS",
                30,
            )?),
            log_format: parse_env_or_default("PICKUP_LOG_FORMAT", LogFormat::Text)?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Issuance tunables derived from this configuration.
    #[must_use]
    pub const fn issuance_policy(&self) -> IssuancePolicy {
        IssuancePolicy {
            upstream_timeout: self.upstream_timeout,
            token_number_attempts: self.token_number_attempts,
        }
    }

    /// Configuration for tests and in-memory runs. Never connects anywhere.
    #[must_use]
    pub fn for_local() -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/pickup"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            upstream_timeout: Duration::from_secs(5),
            token_number_attempts: 5,
            shop_cache_ttl: Duration::from_secs(30),
            log_format: LogFormat::Text,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
