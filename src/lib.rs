pub mod cache;
pub mod config;
pub mod error;
pub mod monitoring;
pub mod provider;

pub use cache::{CacheCoordinator, CacheKey, KeyBuilder, Params};
pub use config::{AppConfig, CacheConfig, CacheOptions, ProviderConfig};
pub use error::{CacheError, ConfigError, FetchError, ProducerError};
pub use monitoring::MetricsRecorder;
pub use provider::{FetchOutcome, NormalizedHotelRecord, ResilientFetchClient, ResultOrigin};
