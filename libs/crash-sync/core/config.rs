//! Client configuration
//!
//! Loaded from YAML, then overridden from the environment, then validated.
//! Every field has a default so an empty file is a valid configuration.

use crate::error::ConfigError;
use crate::game::Cryptocurrency;
use crate::logging::{LogLevel, DEFAULT_LOG_CAPACITY};
use crate::traits::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Overrides `server_url`
pub const ENV_SERVER_URL: &str = "CRASH_SERVER_URL";
/// Overrides `logging.level`
pub const ENV_LOG_LEVEL: &str = "CRASH_LOG_LEVEL";

pub const DEFAULT_SERVER_URL: &str = "wss://crashgamebackend-wzba.onrender.com";

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint (ws:// or wss://)
    pub server_url: String,
    pub reconnect: ReconnectConfig,
    pub timeouts: TimeoutConfig,
    pub logging: LoggingConfig,
    pub betting: BettingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            reconnect: ReconnectConfig::default(),
            timeouts: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
            betting: BettingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Upper bound (exclusive) of the random delay added to each attempt
    pub jitter_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 3000,
            max_delay_ms: 30000,
            jitter_ms: 1000,
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Place-bet / cash-out guard lifetime without a server response
    pub intent_timeout_ms: u64,
    /// Stuck-bet watchdog period
    pub watchdog_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            intent_timeout_ms: 10000,
            watchdog_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Records kept in memory
    pub capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Front-end defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BettingConfig {
    pub default_bet_usd: f64,
    pub default_cryptocurrency: Cryptocurrency,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            default_bet_usd: 10.0,
            default_cryptocurrency: Cryptocurrency::Bitcoin,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml(&yaml_content)
    }

    /// Parse YAML, apply environment overrides and validate
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map
        let mut config: ClientConfig = if yaml.trim().is_empty() {
            ClientConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = ClientConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(ENV_SERVER_URL) {
            info!("Overriding server URL from environment variable");
            self.server_url = url;
        }
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            info!("Overriding log level from environment variable");
            self.logging.level = level.parse()?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let url = self.server_url.trim();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) || url.len() <= "wss://".len()
        {
            return Err(ConfigError::ValidationError(format!(
                "server_url must be a ws:// or wss:// URL, got '{}'",
                self.server_url
            )));
        }

        let r = &self.reconnect;
        if r.base_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect.base_delay_ms must be greater than 0".to_string(),
            ));
        }
        if r.max_delay_ms < r.base_delay_ms {
            return Err(ConfigError::ValidationError(
                "reconnect.max_delay_ms must be at least reconnect.base_delay_ms".to_string(),
            ));
        }
        if r.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.timeouts.intent_timeout_ms == 0 || self.timeouts.watchdog_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if self.logging.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "logging.capacity must be at least 1".to_string(),
            ));
        }

        let bet = self.betting.default_bet_usd;
        if !(bet.is_finite() && bet > 0.0) {
            return Err(ConfigError::ValidationError(
                "betting.default_bet_usd must be a positive number".to_string(),
            ));
        }

        Ok(())
    }

    /// Backoff built from the reconnect section
    pub fn reconnect_strategy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.reconnect.base_delay_ms),
            Duration::from_millis(self.reconnect.max_delay_ms),
            Some(self.reconnect.max_attempts),
        )
        .with_jitter(Duration::from_millis(self.reconnect.jitter_ms))
    }

    pub fn intent_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.intent_timeout_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.timeouts.watchdog_interval_ms)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Server: {}", self.server_url);
        info!(
            "  Reconnect: base {}ms, max {}ms, jitter {}ms, {} attempts",
            self.reconnect.base_delay_ms,
            self.reconnect.max_delay_ms,
            self.reconnect.jitter_ms,
            self.reconnect.max_attempts
        );
        info!(
            "  Timeouts: intent {}ms, watchdog {}ms",
            self.timeouts.intent_timeout_ms, self.timeouts.watchdog_interval_ms
        );
        info!("  Log level: {}", self.logging.level);
    }
}
