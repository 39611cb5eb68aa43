// src/error.rs
// Error taxonomy for the cache tiers, the provider client and configuration

use thiserror::Error;

/// Failures raised inside the caching tiers.
///
/// None of these ever reach a `get`/`set` caller: the coordinator absorbs
/// them and reports them to its `CacheObserver`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    #[error("Shared cache tier unavailable: {0}")]
    TierUnavailable(String),

    #[error("Cache value serialization failed: {0}")]
    Serialization(String),

    #[error("Invalid cache option: {0}")]
    InvalidOption(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::TierUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Error text captured from a producer that ran detached from its caller
/// (cache warming). Producers called from `get` keep their own error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Producer failed: {0}")]
pub struct ProducerError(pub String);

impl ProducerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Classification of a failed call to the external search provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Provider request timed out after {0} ms")]
    ApiTimeout(u64),

    #[error("Provider rejected credentials: {0}")]
    AuthError(String),

    #[error("Provider throttled the request: {0}")]
    Throttled(String),

    #[error("Provider request failed: {0}")]
    UpstreamError(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

impl FetchError {
    /// Short machine-friendly label, used in log fields and fallback markers.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::ApiTimeout(_) => "api_timeout",
            FetchError::AuthError(_) => "auth_error",
            FetchError::Throttled(_) => "throttled",
            FetchError::UpstreamError(_) => "upstream_error",
            FetchError::MalformedInput(_) => "malformed_input",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Log directory error: {0}")]
    LogDir(#[from] std::io::Error),

    #[error("Tracing initialization failed: {0}")]
    Tracing(String),
}
