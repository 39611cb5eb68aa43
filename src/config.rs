// src/config.rs
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, ConfigError};

pub const DEFAULT_TTL_SECS: u64 = 300;

/// Read `key` from the environment, falling back to `default` when unset.
/// A value that is present but unparsable is an error, not a silent default.
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            })
        }
        _ => Ok(default),
    }
}

pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of Tier-1 entries before recency eviction
    pub l1_capacity: usize,
    /// Tier-1 retention window; always capped by the per-call TTL
    pub l1_ttl: Duration,
    pub default_ttl: Duration,
    /// Version tag embedded in every key (`namespace:v<version>:`)
    pub key_version: u32,
    pub warm_interval: Duration,
    pub warm_batch_size: usize,
    pub redis_enabled: bool,
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_capacity: 1000,
            l1_ttl: Duration::from_secs(60),
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            key_version: 1,
            warm_interval: Duration::from_secs(30),
            warm_batch_size: 10,
            redis_enabled: false,
            redis_url: None,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let config = Self {
            l1_capacity: env_or("CACHE_L1_CAPACITY", d.l1_capacity)?,
            l1_ttl: Duration::from_secs(env_or("CACHE_L1_TTL_SECS", d.l1_ttl.as_secs())?),
            default_ttl: Duration::from_secs(env_or(
                "CACHE_DEFAULT_TTL_SECS",
                d.default_ttl.as_secs(),
            )?),
            key_version: env_or("CACHE_KEY_VERSION", d.key_version)?,
            warm_interval: Duration::from_secs(env_or(
                "CACHE_WARM_INTERVAL_SECS",
                d.warm_interval.as_secs(),
            )?),
            warm_batch_size: env_or("CACHE_WARM_BATCH", d.warm_batch_size)?,
            redis_enabled: env_flag("REDIS_ENABLED", d.redis_enabled),
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.l1_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CACHE_L1_CAPACITY".to_string(),
                value: "0".to_string(),
            });
        }
        if self.warm_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "CACHE_WARM_INTERVAL_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.redis_enabled && self.redis_url.is_none() {
            return Err(ConfigError::Missing("REDIS_URL".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub application_id: String,
    pub timeout: Duration,
    pub min_interval: Duration,
    pub response_ttl: Duration,
    pub throttle_backoff: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.rakuten.co.jp/services/api/Travel".to_string(),
            application_id: String::new(),
            timeout: Duration::from_secs(10),
            min_interval: Duration::from_millis(100),
            response_ttl: Duration::from_secs(300),
            throttle_backoff: Duration::from_secs(1),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            base_url: env::var("PROVIDER_BASE_URL").unwrap_or(d.base_url),
            application_id: env::var("PROVIDER_APPLICATION_ID").unwrap_or_default(),
            timeout: Duration::from_millis(env_or("PROVIDER_TIMEOUT_MS", 10_000u64)?),
            min_interval: Duration::from_millis(env_or("PROVIDER_MIN_INTERVAL_MS", 100u64)?),
            response_ttl: Duration::from_secs(env_or("PROVIDER_RESPONSE_TTL_SECS", 300u64)?),
            throttle_backoff: Duration::from_millis(env_or(
                "PROVIDER_THROTTLE_BACKOFF_MS",
                1_000u64,
            )?),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if !env_flag("NO_DOTENV", false) {
            dotenvy::dotenv().ok();
        }
        Ok(Self {
            cache: CacheConfig::from_env()?,
            provider: ProviderConfig::from_env()?,
        })
    }
}

/// Per-call options for `CacheCoordinator::get`.
///
/// Fields are private so a zero TTL can never reach the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    ttl: Duration,
    warm: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            warm: false,
        }
    }
}

impl CacheOptions {
    pub fn new(ttl: Duration, warm: bool) -> Result<Self, CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidOption("ttl must be greater than zero".to_string()));
        }
        Ok(Self { ttl, warm })
    }

    pub fn with_ttl_secs(ttl_secs: u64) -> Result<Self, CacheError> {
        Self::new(Duration::from_secs(ttl_secs), false)
    }

    /// Mark the lookup as warm-worthy: the key is queued for background refresh.
    pub fn warm(mut self) -> Self {
        self.warm = true;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_warm(&self) -> bool {
        self.warm
    }
}
