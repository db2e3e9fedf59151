//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CLOVE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CLOVE_TOKEN_SECRET` - HMAC-SHA256 signing secret for bearer tokens
//!   (min 32 bytes, i.e. a 256-bit key)
//!
//! ## Optional
//! - `CLOVE_HOST` - Bind address (default: 127.0.0.1)
//! - `CLOVE_PORT` - Listen port (default: 8080)
//! - `CLOVE_TOKEN_TTL_SECS` - Bearer token lifetime (default: 86400, i.e. 24h)
//! - `CLOVE_ALLOWED_ORIGIN` - CORS allowed origin (default: none)

use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Minimum signing secret length in bytes (256 bits for HMAC-SHA256).
const MIN_TOKEN_SECRET_LENGTH: usize = 32;

/// Default bearer token lifetime in seconds (24 hours).
const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

/// Blocklist of common placeholder patterns (case-insensitive).
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "change-me",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Bearer token signing secret
    pub token_secret: SecretString,
    /// Bearer token lifetime in seconds
    pub token_ttl_secs: i64,
    /// CORS allowed origin, if any
    pub allowed_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the token secret fails validation (length, placeholder detection).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CLOVE_DATABASE_URL")?;
        let host = get_env_or_default("CLOVE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CLOVE_HOST".to_owned(), e.to_string()))?;
        let port = get_env_or_default("CLOVE_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("CLOVE_PORT".to_owned(), e.to_string()))?;

        let token_secret = get_required_env("CLOVE_TOKEN_SECRET")?;
        validate_token_secret(&token_secret, "CLOVE_TOKEN_SECRET")?;
        let token_secret = SecretString::from(token_secret);

        let token_ttl_secs = get_env_or_default(
            "CLOVE_TOKEN_TTL_SECS",
            &DEFAULT_TOKEN_TTL_SECS.to_string(),
        )
        .parse::<i64>()
        .map_err(|e| ConfigError::InvalidEnvVar("CLOVE_TOKEN_TTL_SECS".to_owned(), e.to_string()))?;
        if token_ttl_secs <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CLOVE_TOKEN_TTL_SECS".to_owned(),
                "must be positive".to_owned(),
            ));
        }

        let allowed_origin = get_optional_env("CLOVE_ALLOWED_ORIGIN");

        Ok(Self {
            database_url,
            host,
            port,
            token_secret,
            token_ttl_secs,
            allowed_origin,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_owned()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Validate that the signing secret is long enough and not a placeholder.
fn validate_token_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "must be at least {MIN_TOKEN_SECRET_LENGTH} bytes (got {})",
                secret.len()
            ),
        ));
    }

    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_owned(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_secret_too_short() {
        let result = validate_token_secret("short", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_token_secret_placeholder() {
        let result = validate_token_secret(&"change-me!".repeat(4), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_token_secret_valid() {
        assert!(validate_token_secret("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6:dE8_", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8080,
            token_secret: SecretString::from("x".repeat(32)),
            token_ttl_secs: 3600,
            allowed_origin: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }
}
