//! Structured logging with tracing
//!
//! Sets up:
//! - Console logging, text or JSON
//! - File logging with daily rotation, always JSON
//! - Filtering from RUST_LOG, falling back to the configured level

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::{LogFormat, MonitoringConfig};
use crate::error::ConfigError;

pub const LOG_FILE_PREFIX: &str = "hotelcache.log";

/// Initialize the global tracing subscriber.
///
/// Returns the file writer guard when file logging is on; keep it alive
/// for the life of the program or buffered lines are lost. Calling this
/// when a subscriber is already installed leaves the existing one in place.
pub fn init_tracing(config: &MonitoringConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    if !config.enabled {
        return Ok(None);
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| ConfigError::Tracing(e.to_string()))?;

    let console_text = (config.enable_console_logging && config.log_format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
    });
    let console_json = (config.enable_console_logging && config.log_format == LogFormat::Json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .json()
    });

    let (file_layer, guard) = if config.enable_file_logging {
        config.ensure_log_dir()?;
        let (writer, guard) = tracing_appender::non_blocking(daily(&config.log_dir, LOG_FILE_PREFIX));
        let layer = fmt::layer().with_writer(writer).with_ansi(false).json();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .try_init();

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    Ok(guard)
}
