//! Where and how the crate logs.
//!
//! | variable              | default                  |
//! |-----------------------|--------------------------|
//! | `RUST_LOG`            | `info`                   |
//! | `MONITORING_ENABLED`  | `true`                   |
//! | `LOG_FORMAT`          | `text` (`text` / `json`) |
//! | `LOG_DIR`             | `$HOME/.hotelcache/logs` |
//! | `LOG_FILE_ENABLED`    | `false`                  |
//! | `LOG_CONSOLE_ENABLED` | `true`                   |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{env_flag, env_or};
use crate::error::ConfigError;

/// Console rendering. The file sink always writes JSON lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else if s.eq_ignore_ascii_case("text") {
            Ok(LogFormat::Text)
        } else {
            Err(format!("unknown log format: {}", s))
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Master switch; when off no subscriber is installed
    pub enabled: bool,

    /// Filter used when RUST_LOG is not set
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_dir: PathBuf,
    pub enable_file_logging: bool,
    pub enable_console_logging: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            log_dir: Self::default_log_dir(),
            enable_file_logging: false,
            enable_console_logging: true,
        }
    }
}

impl MonitoringConfig {
    /// Read the table above. An unrecognised `LOG_FORMAT` is rejected.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            enabled: env_flag("MONITORING_ENABLED", d.enabled),
            log_level: env_or("RUST_LOG", d.log_level)?,
            log_format: env_or("LOG_FORMAT", d.log_format)?,
            log_dir: env_or("LOG_DIR", d.log_dir)?,
            enable_file_logging: env_flag("LOG_FILE_ENABLED", d.enable_file_logging),
            enable_console_logging: env_flag("LOG_CONSOLE_ENABLED", d.enable_console_logging),
        })
    }

    pub fn default_log_dir() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
            .join(".hotelcache")
            .join("logs")
    }

    /// Create the log directory (and parents) when file logging needs it.
    pub fn ensure_log_dir(&self) -> Result<(), ConfigError> {
        if self.log_dir.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.log_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.log_dir, std::fs::Permissions::from_mode(0o755))?;
        }
        Ok(())
    }
}
