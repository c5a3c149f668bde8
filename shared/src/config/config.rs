use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::types::server_config::{AppConfig, ConfigError};

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(&contents)?;

    info!("Configuration loaded successfully");
    debug!("Config: {:?}", config);

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to built-in defaults.
/// A file that exists but is invalid is still an error.
pub fn load_config_or_default(path: &str) -> Result<AppConfig, ConfigError> {
    if Path::new(path).exists() {
        return load_config(path);
    }

    warn!("Config file {} not found, using defaults", path);
    let config = AppConfig::default();
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.bind.trim().is_empty() {
        return Err(ConfigError::InvalidConfig("bind cannot be empty".into()));
    }

    if config.server.max_connections == 0 {
        return Err(ConfigError::InvalidConfig(
            "max_connections must be greater than 0".into(),
        ));
    }

    if config.database.path.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "database path cannot be empty".into(),
        ));
    }

    Ok(())
}
