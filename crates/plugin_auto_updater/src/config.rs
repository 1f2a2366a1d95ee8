//! Plugin configuration.
//!
//! Stored as JSON next to the other plugin configs. A missing file is created
//! with the defaults on first load.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// File name of the configuration inside the host's config directory.
pub const CONFIG_FILE_NAME: &str = "auto_updater.json";

/// Schema version written by this build.
pub const CURRENT_CONFIG_VERSION: u32 = 3;

/// Upper bound for every period in the configuration (one day).
pub const MAX_PERIOD_SECONDS: u64 = 86_400;

/// Auto updater settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdaterConfig {
    /// Schema version of the file; missing means a pre-versioning file
    #[serde(default)]
    pub config_version: u32,
    /// Seconds between two update checks
    pub update_check_interval_seconds: u64,
    /// Warning period before players are kicked
    pub restart_delay_seconds: u64,
    /// Grace period between kicking players and terminating the server
    pub shutdown_delay_seconds: u64,
    /// At or below this many active players the warning period is skipped
    pub min_players_instant_shutdown: u32,
    /// Below this fraction of occupied slots the warning period is skipped
    pub min_player_percentage_shutdown_allowed: f32,
    /// Terminate immediately on map change once a restart is scheduled
    pub shutdown_on_map_change_if_pending_update: bool,
    /// Prefix of every chat notice
    pub chat_tag_prefix: String,
    /// Version metadata file, relative to the game directory
    pub version_file: PathBuf,
    /// Up-to-date check endpoint
    pub api_endpoint: String,
    /// Application id sent to the endpoint
    pub app_id: u32,
    /// Stop checking once the local version cannot be determined
    pub stop_on_missing_local_version: bool,
    /// Timeout of one up-to-date request; 0 leaves it to the transport
    pub request_timeout_seconds: u64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION,
            update_check_interval_seconds: 180,
            restart_delay_seconds: 120,
            shutdown_delay_seconds: 1,
            min_players_instant_shutdown: 1,
            min_player_percentage_shutdown_allowed: 0.6,
            shutdown_on_map_change_if_pending_update: true,
            chat_tag_prefix: "[AutoUpdater]".to_string(),
            version_file: PathBuf::from("csgo").join("steam.inf"),
            api_endpoint: "https://api.steampowered.com/ISteamApps/UpToDateCheck/v0001/"
                .to_string(),
            app_id: 730,
            stop_on_missing_local_version: true,
            request_timeout_seconds: 30,
        }
    }
}

impl UpdaterConfig {
    /// Loads the configuration from a JSON file.
    ///
    /// If the file doesn't exist, writes the default configuration to that
    /// path and returns it.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    pub async fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            serde_json::from_str::<UpdaterConfig>(&content)?
        } else {
            let default_config = UpdaterConfig::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, serde_json::to_string_pretty(&default_config)?).await?;
            info!("Created default configuration file: {}", path.display());
            default_config
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_check_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "updateCheckIntervalSeconds must be greater than zero".to_string(),
            ));
        }

        for (key, value) in [
            ("updateCheckIntervalSeconds", self.update_check_interval_seconds),
            ("restartDelaySeconds", self.restart_delay_seconds),
            ("shutdownDelaySeconds", self.shutdown_delay_seconds),
            ("requestTimeoutSeconds", self.request_timeout_seconds),
        ] {
            if value > MAX_PERIOD_SECONDS {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be at most {MAX_PERIOD_SECONDS}, got {value}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.min_player_percentage_shutdown_allowed) {
            return Err(ConfigError::Invalid(format!(
                "minPlayerPercentageShutdownAllowed must be between 0 and 1, got {}",
                self.min_player_percentage_shutdown_allowed
            )));
        }

        if !(self.api_endpoint.starts_with("http://") || self.api_endpoint.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "apiEndpoint must be an http(s) URL, got {:?}",
                self.api_endpoint
            )));
        }

        if self.version_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("versionFile cannot be empty".to_string()));
        }

        Ok(())
    }

    /// True when the file predates the current schema.
    pub fn is_outdated(&self) -> bool {
        self.config_version < CURRENT_CONFIG_VERSION
    }

    pub fn update_check_interval(&self) -> Duration {
        Duration::from_secs(self.update_check_interval_seconds)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_seconds)
    }

    pub fn shutdown_delay(&self) -> Duration {
        Duration::from_secs(self.shutdown_delay_seconds)
    }

    /// `None` when the transport's own timeout applies.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_seconds > 0).then(|| Duration::from_secs(self.request_timeout_seconds))
    }
}
