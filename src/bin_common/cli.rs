//! CLI utilities for binaries
//!
//! Handles configuration loading and environment variables
//! for all binary executables.

use crash_sync::error::ConfigError;
use crash_sync::ClientConfig;
use std::path::{Path, PathBuf};
use tracing::info;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Client configuration (config/client_config.yaml)
    Client,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Client => "config/client_config.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        "CRASH_CONFIG_PATH"
    }
}

/// Load configuration path from environment or use default
///
/// A custom path always wins over the environment.
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    if let ConfigType::Custom(path) = &config_type {
        return PathBuf::from(path);
    }
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Load the client configuration at `path`, falling back to defaults plus
/// environment overrides when the file does not exist.
pub fn load_client_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    if path.exists() {
        ClientConfig::load(path)
    } else {
        info!("No config file at {}, using defaults", path.display());
        ClientConfig::from_env()
    }
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
