//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CARDTRADE_API_URL` - Base URL of the REST backend (e.g. `https://api.example.com/api`)
//!
//! ## Optional
//! - `CARDTRADE_API_TOKEN` - Bearer token sent with every request
//! - `CARDTRADE_ADMIN_ACCOUNT_ID` - Account contacted by "contact admin"
//! - `CARDTRADE_POLL_INTERVAL_SECS` - Marketplace refresh interval (default: 5)
//! - `CARDTRADE_POLL_MAX_BACKOFF_SECS` - Refresh backoff cap after failures (default: 60)
//! - `CARDTRADE_LOOKUP_MAX_ATTEMPTS` - Account id lookup attempts (default: 5)
//! - `CARDTRADE_LOOKUP_INITIAL_DELAY_MS` - First lookup retry delay (default: 500)
//! - `CARDTRADE_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::str::FromStr;
use std::time::Duration;

use cardtrade_core::AccountId;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::auth::RetryPolicy;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "insert",
    "put-your",
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

/// Marketplace polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between two refreshes while the backend is healthy.
    pub interval: Duration,
    /// Upper bound of the delay after repeated failures.
    pub max_backoff: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Client configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend base URL, always ending with `/`
    pub api_url: Url,
    /// Bearer token for the backend
    pub api_token: Option<SecretString>,
    /// Administrator account for support conversations
    pub admin_account_id: Option<AccountId>,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// Marketplace polling
    pub poll: PollSettings,
    /// Account id lookup retries
    pub lookup_retry: RetryPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("admin_account_id", &self.admin_account_id)
            .field("http_timeout", &self.http_timeout)
            .field("poll", &self.poll)
            .field("lookup_retry", &self.lookup_retry)
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the backend URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_url` is not an absolute
    /// http(s) URL.
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_base_url("CARDTRADE_API_URL", api_url)?,
            api_token: None,
            admin_account_id: None,
            http_timeout: Duration::from_secs(15),
            poll: PollSettings::default(),
            lookup_retry: RetryPolicy::default(),
            sentry_dsn: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if the API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let mut config = Self::new(&env.required("CARDTRADE_API_URL")?)?;

        if let Some(token) = env.optional("CARDTRADE_API_TOKEN") {
            let token = SecretString::from(token);
            validate_secret_strength(token.expose_secret(), "CARDTRADE_API_TOKEN")?;
            config.api_token = Some(token);
        }
        config.admin_account_id = env
            .optional("CARDTRADE_ADMIN_ACCOUNT_ID")
            .map(|raw| parse_value::<i64>("CARDTRADE_ADMIN_ACCOUNT_ID", &raw))
            .transpose()?
            .map(AccountId::new);

        config.http_timeout =
            Duration::from_secs(env.parsed_or("CARDTRADE_HTTP_TIMEOUT_SECS", 15)?);
        config.poll = PollSettings {
            interval: Duration::from_secs(env.parsed_or("CARDTRADE_POLL_INTERVAL_SECS", 5)?),
            max_backoff: Duration::from_secs(
                env.parsed_or("CARDTRADE_POLL_MAX_BACKOFF_SECS", 60)?,
            ),
        };
        if config.poll.interval.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "CARDTRADE_POLL_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let max_attempts: u32 = env.parsed_or("CARDTRADE_LOOKUP_MAX_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CARDTRADE_LOOKUP_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        config.lookup_retry = RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(
                env.parsed_or("CARDTRADE_LOOKUP_INITIAL_DELAY_MS", 500)?,
            ),
            ..RetryPolicy::default()
        };

        config.sentry_dsn = env.optional("SENTRY_DSN");
        Ok(config)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable; blank counts as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map_or(Ok(default), |raw| parse_value(key, &raw))
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the backend URL and make sure relative joins keep its path.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Validate that a secret is not a placeholder.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}
