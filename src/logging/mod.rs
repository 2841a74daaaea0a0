//! Structured logging for the repository tooling.
//!
//! Every run writes to a rolling log file and to stderr. Both sinks can emit
//! JSON instead of plain text. `RUST_LOG` overrides the configured level.

mod init;
pub use init::{init_logging, parse_level, parse_rotation};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::rolling::Rotation;

use crate::config::LoggingConfig;

pub const LOG_FILENAME: &str = "binders-repository.log";

/// Directory used when neither the config file nor the command line names one.
#[must_use]
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".binders")
        .join("logs")
}

/// Resolved logging settings.
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_level: Level,
    pub json_format: bool,
    pub rotation: Rotation,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from(&LoggingConfig::default())
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(section: &LoggingConfig) -> Self {
        Self {
            log_dir: section.dir.clone().unwrap_or_else(default_log_dir),
            log_level: parse_level(&section.level),
            json_format: section.json,
            rotation: parse_rotation(&section.rotation),
        }
    }
}

#[cfg(test)]
#[path = "../logging_tests.rs"]
mod logging_tests;
