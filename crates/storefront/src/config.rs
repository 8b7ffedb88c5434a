//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CATALOG_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CATALOG_BASE_URL` - Public URL for the storefront
//! - `CATALOG_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `CATALOG_HOST` - Bind address (default: 127.0.0.1)
//! - `CATALOG_PORT` - Listen port (default: 3000)
//! - `CATALOG_API_URL` - Remote catalog endpoint (default: <https://fakestoreapi.com/products>)
//! - `CATALOG_API_TIMEOUT_SECS` - Remote request timeout (default: 5)
//! - `CATALOG_API_MAX_REDIRECTS` - Redirects followed per request (default: 3)
//! - `CATALOG_PRODUCTS_TTL_SECS` - Product list cache TTL (default: 900)
//! - `CATALOG_RENDER_TTL_SECS` - Rendered grid cache TTL (default: 300)
//! - `CATALOG_COMMERCE_ENABLED` - Whether catalog management is active (default: true)
//! - `CATALOG_SYNC_PARAM` - Query parameter that triggers a sync (default: `sync_products`)
//! - `CATALOG_UPDATE_EXISTING` - Re-apply title/description/price on re-sync (default: false)
//! - `CATALOG_MEDIA_DIR` - Directory for imported images (default: crates/storefront/media)
//! - `CATALOG_HOME_CONTENT` - Home page content, may contain `[api_products]` (default: `[api_products]`)
//! - `CATALOG_DEBUG` - Log image import failures at warn level (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default remote catalog endpoint.
pub const DEFAULT_API_URL: &str = "https://fakestoreapi.com/products";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Remote catalog API settings
    pub remote: RemoteCatalogConfig,
    /// Cache lifetimes
    pub cache: CacheConfig,
    /// Catalog sync behavior
    pub sync: SyncConfig,
    /// Where imported images are written
    pub media_dir: PathBuf,
    /// Home page content
    pub home_content: String,
    /// Verbose logging of per-record import failures
    pub debug: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote catalog API settings.
#[derive(Debug, Clone)]
pub struct RemoteCatalogConfig {
    /// Endpoint returning the product list
    pub endpoint: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// Maximum redirects followed
    pub max_redirects: usize,
}

/// Time-to-live for each cache namespace.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Raw product list
    pub products_ttl: Duration,
    /// Rendered grid markup
    pub render_ttl: Duration,
}

/// Catalog sync settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Whether the commerce module is active at all
    pub commerce_enabled: bool,
    /// Query parameter that triggers a sync
    pub trigger_param: String,
    /// Re-apply remote title/description/price to existing records
    pub update_existing: bool,
}

impl Default for RemoteCatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            timeout: Duration::from_secs(5),
            max_redirects: 3,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            products_ttl: Duration::from_secs(15 * 60),
            render_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            commerce_enabled: true,
            trigger_param: "sync_products".to_string(),
            update_existing: false,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CATALOG_DATABASE_URL")?;
        let host = get_env_or_default("CATALOG_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CATALOG_HOST".to_string(), e.to_string()))?;
        let port = parse_env("CATALOG_PORT", 3000_u16)?;
        let base_url = get_required_env("CATALOG_BASE_URL")?;
        let session_secret = get_validated_secret("CATALOG_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "CATALOG_SESSION_SECRET")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            remote: RemoteCatalogConfig::from_env()?,
            cache: CacheConfig::from_env()?,
            sync: SyncConfig::from_env()?,
            media_dir: media_dir_from_env(),
            home_content: get_env_or_default("CATALOG_HOME_CONTENT", "[api_products]"),
            debug: debug_from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl RemoteCatalogConfig {
    /// Load remote API settings from `CATALOG_API_*`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for a malformed or non-http(s) URL
    /// or unparsable numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = get_env_or_default("CATALOG_API_URL", DEFAULT_API_URL);
        let endpoint = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidEnvVar("CATALOG_API_URL".to_string(), e.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "CATALOG_API_URL".to_string(),
                format!("unsupported scheme '{}'", endpoint.scheme()),
            ));
        }

        Ok(Self {
            endpoint,
            timeout: Duration::from_secs(parse_env("CATALOG_API_TIMEOUT_SECS", 5_u64)?),
            max_redirects: parse_env("CATALOG_API_MAX_REDIRECTS", 3_usize)?,
        })
    }
}

impl CacheConfig {
    /// Load cache lifetimes from `CATALOG_*_TTL_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for unparsable numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            products_ttl: Duration::from_secs(parse_env("CATALOG_PRODUCTS_TTL_SECS", 900_u64)?),
            render_ttl: Duration::from_secs(parse_env("CATALOG_RENDER_TTL_SECS", 300_u64)?),
        })
    }
}

impl SyncConfig {
    /// Load sync settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for an empty trigger parameter or
    /// a malformed boolean.
    pub fn from_env() -> Result<Self, ConfigError> {
        let trigger_param = get_env_or_default("CATALOG_SYNC_PARAM", "sync_products");
        if trigger_param.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "CATALOG_SYNC_PARAM".to_string(),
                "must not be empty".to_string(),
            ));
        }

        Ok(Self {
            commerce_enabled: parse_bool_env("CATALOG_COMMERCE_ENABLED", true)?,
            trigger_param,
            update_existing: parse_bool_env("CATALOG_UPDATE_EXISTING", false)?,
        })
    }
}

/// Directory imported images are written to (`CATALOG_MEDIA_DIR`).
#[must_use]
pub fn media_dir_from_env() -> PathBuf {
    PathBuf::from(get_env_or_default(
        "CATALOG_MEDIA_DIR",
        "crates/storefront/media",
    ))
}

/// Whether per-record import failures are logged at warn (`CATALOG_DEBUG`).
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if the value is not a boolean.
pub fn debug_from_env() -> Result<bool, ConfigError> {
    parse_bool_env("CATALOG_DEBUG", false)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Parse a boolean environment variable (`1/0`, `true/false`, `yes/no`, `on/off`).
fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(value) => parse_bool(&value).ok_or_else(|| {
            ConfigError::InvalidEnvVar(key.to_string(), format!("not a boolean: '{value}'"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
    let len = s.len() as f64;
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

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
