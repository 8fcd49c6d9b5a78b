//! Process-wide configuration for the fair-share scheduling core.
//!
//! Follows the same load-or-bootstrap convention used across this
//! codebase: read `$CONFIG_FILE` (default `config.toml`) if present,
//! otherwise write out a generated default and use it in-memory.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub controller: ControllerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// EMA smoothing coefficient, must be in `(0, 1]`. Re-read every
    /// controller tick so it can be updated live.
    pub alpha: f64,
    /// The "fairy interval": how often the controller revises priorities.
    pub tick_interval_ms: u64,
    /// Deadline for a single job's `get_stats` call.
    pub stats_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller: ControllerConfig {
                alpha: 0.5,
                tick_interval_ms: 1000,
                stats_timeout_ms: 100,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(ConfigError::invalid(format!(
                "controller.alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "controller.tick_interval_ms must be non-zero",
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        let config = if std::path::Path::new(&config_file).exists() {
            let contents =
                std::fs::read_to_string(&config_file).map_err(|source| ConfigError::Read {
                    path: config_file.clone(),
                    source,
                })?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_file, contents).map_err(|source| ConfigError::Read {
                path: config_file.clone(),
                source,
            })?;
            default_config
        };

        config.controller.validate()?;
        Ok(config)
    }
}
