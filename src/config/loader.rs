use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{ConfigError, RepositoryConfig};

/// Resolve the canonical path for the repository config file.
#[must_use]
pub fn repository_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".binders").join("repository.toml"))
}

/// Load the configuration from `~/.binders/repository.toml`.
///
/// Returns `Ok(RepositoryConfig::default())` if the file does not exist.
pub fn load_repository_config() -> Result<RepositoryConfig, ConfigError> {
    let Some(path) = repository_config_path() else {
        warn!("Could not determine home directory; using default repository config");
        return Ok(RepositoryConfig::default());
    };
    if !path.exists() {
        debug!("Repository config not found at {}; using defaults", path.display());
        return Ok(RepositoryConfig::default());
    }
    load_config_from(&path)
}

/// Load and validate the configuration at an explicit path.
pub fn load_config_from(path: &Path) -> Result<RepositoryConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: RepositoryConfig = toml::from_str(&content)?;
    config.validate()?;
    debug!("Loaded repository config from {}", path.display());
    Ok(config)
}
