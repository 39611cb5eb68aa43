//! Monitoring module for hotelcache
//!
//! Provides:
//! - Structured logging with tracing
//! - Per-instance Prometheus counters for the cache and provider client

pub mod config;
pub mod metrics;
pub mod tracing_config;

pub use config::{LogFormat, MonitoringConfig};
pub use metrics::{ComponentMetrics, MetricsRecorder, MetricsSnapshot};

use std::sync::Arc;
use std::time::Instant;
use tracing_appender::non_blocking::WorkerGuard;

use crate::error::ConfigError;

/// Logging guard plus the metrics recorder handed to the cache and client.
pub struct MonitoringContext {
    pub config: MonitoringConfig,
    pub metrics: Arc<MetricsRecorder>,
    pub startup_time: Instant,
    _guard: Option<WorkerGuard>,
}

impl MonitoringContext {
    /// Initialize tracing and create a fresh metrics registry.
    pub fn new(config: MonitoringConfig) -> Result<Self, ConfigError> {
        let guard = tracing_config::init_tracing(&config)?;
        let metrics = MetricsRecorder::new().map_err(|e| ConfigError::Tracing(e.to_string()))?;

        tracing::info!(
            log_format = config.log_format.as_str(),
            file_logging = config.enable_file_logging,
            "Monitoring initialized"
        );

        Ok(Self {
            config,
            metrics: Arc::new(metrics),
            startup_time: Instant::now(),
            _guard: guard,
        })
    }

    pub fn startup_complete(&self) {
        tracing::info!(
            duration_ms = self.startup_time.elapsed().as_millis() as u64,
            "Startup complete"
        );
    }
}
