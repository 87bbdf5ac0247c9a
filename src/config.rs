//! Configuration for the listing cache and its Redis backend.
//!
//! Values come from environment variables. `AppConfig::load` additionally
//! reads a `.env` file when one is present. Parsing goes through a lookup
//! function, so tests can supply variables without touching the process
//! environment.
//!
//! # Environment Variables
//!
//! - `TASK_CACHE_ENABLED`: `true`/`false`/`1`/`0` (default: `true`)
//! - `TASK_CACHE_TTL_SECS`: listing TTL in seconds (default: 900)
//! - `TASK_CACHE_LOCK_TTL_SECS`: rebuild lock TTL in seconds (default: 30)
//! - `TASK_CACHE_LOCK_RETRY_DELAY_MS`: base delay between lock polls (default: 100)
//! - `TASK_CACHE_LOCK_MAX_RETRIES`: lock polls before giving up (default: 10)
//! - `TASK_CACHE_SCAN_BATCH_SIZE`: keys per SCAN round-trip (default: 100)
//! - `REDIS_URL`: Redis connection URL (default: `redis://localhost:6379`)

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Defaults
// =============================================================================

/// Listing TTL: 15 minutes.
pub const DEFAULT_LISTING_TTL: Duration = Duration::from_secs(900);

/// Safety-net expiry of a rebuild lock.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Base of the linear backoff between lock polls.
pub const DEFAULT_LOCK_RETRY_DELAY: Duration = Duration::from_millis(100);

pub const DEFAULT_LOCK_MAX_RETRIES: u32 = 10;

pub const DEFAULT_SCAN_BATCH_SIZE: usize = 100;

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

// =============================================================================
// Config Error
// =============================================================================

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {name}: {message} (got '{value}')")]
    InvalidValue {
        name: String,
        message: String,
        value: String,
    },

    /// A variable parsed but is outside its allowed range.
    #[error("Out of range value for {name}: {message}")]
    OutOfRange { name: String, message: String },
}

// =============================================================================
// Cache Config
// =============================================================================

/// Tuning of the listing cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// When `false`, lookups bypass the store and writes are skipped;
    /// invalidation still runs.
    pub enabled: bool,
    pub listing_ttl: Duration,
    pub lock_ttl: Duration,
    pub lock_retry_delay: Duration,
    pub lock_max_retries: u32,
    pub scan_batch_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listing_ttl: DEFAULT_LISTING_TTL,
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_retry_delay: DEFAULT_LOCK_RETRY_DELAY,
            lock_max_retries: DEFAULT_LOCK_MAX_RETRIES,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }
}

impl CacheConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unparsable or
    /// out-of-range value. Missing variables use defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`CacheConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enabled = parse_bool(&lookup, "TASK_CACHE_ENABLED", defaults.enabled)?;
        let listing_ttl = Duration::from_secs(parse_number(
            &lookup,
            "TASK_CACHE_TTL_SECS",
            defaults.listing_ttl.as_secs(),
        )?);
        let lock_ttl = Duration::from_secs(parse_number(
            &lookup,
            "TASK_CACHE_LOCK_TTL_SECS",
            defaults.lock_ttl.as_secs(),
        )?);
        let lock_retry_delay = Duration::from_millis(parse_number(
            &lookup,
            "TASK_CACHE_LOCK_RETRY_DELAY_MS",
            u64::try_from(defaults.lock_retry_delay.as_millis()).unwrap_or(u64::MAX),
        )?);
        let lock_max_retries = parse_number(
            &lookup,
            "TASK_CACHE_LOCK_MAX_RETRIES",
            defaults.lock_max_retries,
        )?;
        let scan_batch_size = parse_number(
            &lookup,
            "TASK_CACHE_SCAN_BATCH_SIZE",
            defaults.scan_batch_size,
        )?;

        if scan_batch_size == 0 {
            return Err(ConfigError::OutOfRange {
                name: "TASK_CACHE_SCAN_BATCH_SIZE".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            enabled,
            listing_ttl,
            lock_ttl,
            lock_retry_delay,
            lock_max_retries,
            scan_batch_size,
        })
    }

    /// A configuration with caching switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_lock_retry_delay(self, lock_retry_delay: Duration) -> Self {
        Self {
            lock_retry_delay,
            ..self
        }
    }

    #[must_use]
    pub const fn with_lock_max_retries(self, lock_max_retries: u32) -> Self {
        Self {
            lock_max_retries,
            ..self
        }
    }

    #[must_use]
    pub const fn with_scan_batch_size(self, scan_batch_size: usize) -> Self {
        Self {
            scan_batch_size,
            ..self
        }
    }
}

// =============================================================================
// Redis Config
// =============================================================================

/// Connection settings for the Redis cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Format: `redis://[user[:password]@]host[:port][/database]`
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
        }
    }
}

impl RedisConfig {
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup("REDIS_URL")
            .filter(|url| !url.trim().is_empty())
            .map_or_else(Self::default, Self::with_url)
    }
}

// =============================================================================
// App Config
// =============================================================================

/// Everything needed to assemble the caching layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub redis: RedisConfig,
}

impl AppConfig {
    /// Loads `.env` (if present) and then reads the environment.
    ///
    /// # I/O Notice
    ///
    /// Reads the filesystem and the process environment. Call once at
    /// startup and share the result.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for invalid variable values.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(error) = dotenvy::dotenv() {
            if !error.not_found() {
                tracing::warn!(error = %error, "Failed to read .env file, using process environment");
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// # Errors
    ///
    /// Returns `ConfigError` for invalid variable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            cache: CacheConfig::from_lookup(&lookup)?,
            redis: RedisConfig::from_lookup(&lookup),
        })
    }
}

// =============================================================================
// Variable Parsing
// =============================================================================

fn parse_number<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|error: T::Err| ConfigError::InvalidValue {
                name: name.to_string(),
                message: error.to_string(),
                value,
            }),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                message: "expected true, false, 1 or 0".to_string(),
                value,
            }),
        },
        None => Ok(default),
    }
}
