//! Configuration of the standalone host, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Game server the updater watches
    pub host: HostSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Description of the watched game server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    /// Installation directory; the version file is resolved against it
    pub game_directory: String,
    /// Where plugin configuration files live
    pub config_directory: String,
    /// Player slots of the server
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    /// Advertised player slots, when lower than `max_players`
    #[serde(default)]
    pub visible_max_players: Option<u32>,
    /// Map reported as running on startup
    #[serde(default = "default_map")]
    pub map: String,
}

fn default_max_players() -> u32 {
    10
}

fn default_map() -> String {
    "de_dust2".to_string()
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: HostSettings {
                game_directory: ".".to_string(),
                config_directory: "configs".to_string(),
                max_players: default_max_players(),
                visible_max_players: None,
                map: default_map(),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn game_directory(&self) -> PathBuf {
        PathBuf::from(&self.host.game_directory)
    }

    pub fn config_directory(&self) -> PathBuf {
        PathBuf::from(&self.host.config_directory)
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.game_directory.is_empty() {
            return Err("Game directory cannot be empty".to_string());
        }

        if self.host.config_directory.is_empty() {
            return Err("Config directory cannot be empty".to_string());
        }

        if self.host.max_players == 0 {
            return Err("max_players must be greater than zero".to_string());
        }

        if let Some(visible) = self.host.visible_max_players {
            if visible > self.host.max_players {
                return Err(format!(
                    "visible_max_players ({}) cannot exceed max_players ({})",
                    visible, self.host.max_players
                ));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
