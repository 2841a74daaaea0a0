//! Repository configuration loaded from `~/.binders/repository.toml`.
//!
//! The file is optional; every section and field falls back to its default.
//! Durations are written as human readable strings (`"100ms"`, `"1h"`,
//! `"30d"`) and validated when converted into runtime settings.

mod loader;
pub use loader::{load_config_from, load_repository_config, repository_config_path};

use crate::migration::CountVerification;
use crate::store::{RetryPolicy, ScrollSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read repository config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse repository config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid duration '{value}' for {field}: {source}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|source| ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
        source,
    })
}

fn binders_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".binders")
}

/// An alias and the physical index it points to when bootstrapped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexNames {
    pub alias: String,
    pub index: String,
}

impl IndexNames {
    #[must_use]
    pub fn new(alias: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            index: index.into(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub snapshot_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: binders_root().join("store.json"),
        }
    }
}

/// `[indices]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicesConfig {
    pub binders: IndexNames,
    pub collections: IndexNames,
    pub publications: IndexNames,
}

impl Default for IndicesConfig {
    fn default() -> Self {
        Self {
            binders: IndexNames::new("binders", "binders-binders-v3"),
            collections: IndexNames::new("collections", "binders-collections-v3"),
            publications: IndexNames::new("publications", "publications-v3"),
        }
    }
}

/// `[scroll]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrollConfig {
    pub page_size: usize,
    pub keep_alive: String,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            keep_alive: "1h".to_string(),
        }
    }
}

impl ScrollConfig {
    pub fn settings(&self) -> Result<ScrollSettings, ConfigError> {
        Ok(ScrollSettings {
            page_size: self.page_size.max(1),
            keep_alive: parse_duration("scroll.keep_alive", &self.keep_alive)?,
        })
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: String,
    pub max_backoff: String,
    pub call_timeout: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: "100ms".to_string(),
            max_backoff: "5s".to_string(),
            call_timeout: "30s".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy, ConfigError> {
        Ok(RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: parse_duration("retry.initial_backoff", &self.initial_backoff)?,
            max_backoff: parse_duration("retry.max_backoff", &self.max_backoff)?,
            call_timeout: parse_duration("retry.call_timeout", &self.call_timeout)?,
        })
    }
}

/// `[reindex]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReindexConfig {
    pub verification_attempts: u32,
    pub poll_interval: String,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            verification_attempts: 10,
            poll_interval: "10s".to_string(),
        }
    }
}

impl ReindexConfig {
    pub fn verification(&self) -> Result<CountVerification, ConfigError> {
        Ok(CountVerification {
            max_attempts: self.verification_attempts.max(1),
            poll_interval: parse_duration("reindex.poll_interval", &self.poll_interval)?,
        })
    }
}

/// `[resolver]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Deepest collection nesting walked before giving up.
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// `[purge]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PurgeConfig {
    /// How long soft-deleted items are kept before permanent deletion.
    pub retention: String,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            retention: "30d".to_string(),
        }
    }
}

impl PurgeConfig {
    pub fn retention(&self) -> Result<Duration, ConfigError> {
        parse_duration("purge.retention", &self.retention)
    }
}

/// `[operation_log]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OperationLogConfig {
    pub enabled: bool,
    /// JSON lines file receiving write records. Defaults next to the snapshot.
    pub path: Option<PathBuf>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub dir: Option<PathBuf>,
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
            rotation: "daily".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepositoryConfig {
    pub store: StoreConfig,
    pub indices: IndicesConfig,
    pub scroll: ScrollConfig,
    pub retry: RetryConfig,
    pub reindex: ReindexConfig,
    pub resolver: ResolverConfig,
    pub purge: PurgeConfig,
    pub operation_log: OperationLogConfig,
    pub logging: LoggingConfig,
}

impl RepositoryConfig {
    /// Check every duration field parses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scroll.settings()?;
        self.retry.policy()?;
        self.reindex.verification()?;
        self.purge.retention()?;
        Ok(())
    }

    /// Where write records go when the operation log is enabled.
    #[must_use]
    pub fn operation_log_path(&self) -> PathBuf {
        self.operation_log.path.clone().unwrap_or_else(|| {
            self.store
                .snapshot_path
                .with_file_name("operations.jsonl")
        })
    }
}

#[cfg(test)]
#[path = "../config_tests.rs"]
mod config_tests;
