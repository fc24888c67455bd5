//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOP_SCOUT_API_URL` - Base URL of the REST backend
//! - `SHOP_SCOUT_STORAGE_URL` - Base URL of the object storage service
//!
//! ## Optional
//! - `SHOP_SCOUT_API_KEY` - Public API key sent as the `apikey` header
//! - `SHOP_SCOUT_ACCESS_TOKEN` - Bearer token of a signed-in user
//! - `SHOP_SCOUT_USER_ID` - ID of the signed-in user (used with the token)
//! - `SHOP_SCOUT_DEMO_MODE` - Keep all changes local (default: false)
//! - `SHOP_SCOUT_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SHOP_SCOUT_REVIEW_CACHE_TTL_SECS` - Review list cache TTL (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use shop_scout_core::UserId;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
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

/// Client configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the REST backend
    pub api_url: Url,
    /// Base URL of the object storage service
    pub storage_url: Url,
    /// Public API key (safe to ship in a client, still kept out of logs)
    pub api_key: Option<SecretString>,
    /// Bearer token of a signed-in user
    pub access_token: Option<SecretString>,
    /// ID of the signed-in user
    pub user_id: Option<UserId>,
    /// Keep every change local, never call the backend for mutations
    pub demo_mode: bool,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// How long a shop's review list is served from cache
    pub review_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url.as_str())
            .field("storage_url", &self.storage_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("user_id", &self.user_id)
            .field("demo_mode", &self.demo_mode)
            .field("http_timeout", &self.http_timeout)
            .field("review_cache_ttl", &self.review_cache_ttl)
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Lookup(&lookup);

        let api_url = env.url("SHOP_SCOUT_API_URL")?;
        let storage_url = env.url("SHOP_SCOUT_STORAGE_URL")?;

        let api_key = match env.optional("SHOP_SCOUT_API_KEY") {
            Some(value) => {
                validate_secret_strength(&value, "SHOP_SCOUT_API_KEY")?;
                Some(SecretString::from(value))
            }
            None => None,
        };
        let access_token = env
            .optional("SHOP_SCOUT_ACCESS_TOKEN")
            .map(SecretString::from);
        let user_id = env
            .optional("SHOP_SCOUT_USER_ID")
            .map(|raw| UserId::parse(&raw))
            .transpose()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SHOP_SCOUT_USER_ID".to_string(), e.to_string())
            })?;

        let demo_mode = env.bool_or("SHOP_SCOUT_DEMO_MODE", false)?;
        let http_timeout = Duration::from_secs(env.u64_or("SHOP_SCOUT_HTTP_TIMEOUT_SECS", 30)?);
        let review_cache_ttl =
            Duration::from_secs(env.u64_or("SHOP_SCOUT_REVIEW_CACHE_TTL_SECS", 60)?);
        let sentry_dsn = env.optional("SENTRY_DSN");

        Ok(Self {
            api_url,
            storage_url,
            api_key,
            access_token,
            user_id,
            demo_mode,
            http_timeout,
            review_cache_ttl,
            sentry_dsn,
        })
    }

    /// Whether a signed-in identity is configured.
    #[must_use]
    pub const fn has_session(&self) -> bool {
        self.access_token.is_some() && self.user_id.is_some()
    }

    /// Raw API key value, for the `apikey` header.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|key| key.expose_secret())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Typed accessors over a key/value lookup.
struct Lookup<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Lookup<'_, F> {
    /// Get an optional variable, treating empty values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a required variable parsed as an absolute URL.
    fn url(&self, key: &str) -> Result<Url, ConfigError> {
        let raw = self.required(key)?;
        let url = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must be a base URL".to_string(),
            ));
        }
        Ok(url)
    }

    /// Get a boolean variable with a default.
    fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        self.optional(key).map_or(Ok(default), |raw| {
            parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnvVar(key.to_string(), format!("not a boolean: {raw}"))
            })
        })
    }

    /// Get an unsigned integer variable with a default.
    fn u64_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real keys are random)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the backend."
            ),
        ));
    }

    Ok(())
}
