//! # Auto Updater Plugin
//!
//! Watches for new builds of the game server and restarts the server once one
//! is released, warning players first when enough of them are online.
//!
//! ## Flow
//!
//! 1. Every `updateCheckIntervalSeconds` the local build is read from the
//!    version metadata file and compared against the vendor's up-to-date check.
//! 2. When an update exists, polling stops and the population policy decides
//!    between an instant restart and a warning period of `restartDelaySeconds`.
//! 3. Players spawning during the warning period are warned once.
//! 4. When the period ends every player is kicked and the server terminates.
//!    A map change while a restart is pending terminates immediately.
//!
//! Other plugins can subscribe to `plugin:auto_updater:update_found`.

pub mod client;
pub mod config;
pub mod error;
pub mod notice;
pub mod poller;
pub mod runtime;
pub mod sequencer;
pub mod tracker;
pub mod version;

pub use client::{SteamVersionClient, UpToDateCheck, VersionSource};
pub use config::{UpdaterConfig, CONFIG_FILE_NAME, CURRENT_CONFIG_VERSION};
pub use error::{ConfigError, UpdateCheckError};
pub use poller::{UpdateStatus, VersionPoller};
pub use runtime::{Command, UpdateFoundEvent, PLUGIN_NAME, UPDATE_FOUND_EVENT};
pub use sequencer::{Directive, SequencerState, ShutdownSequencer};
pub use tracker::NotificationTracker;
pub use version::LocalVersion;

use async_trait::async_trait;
use host_api::{
    event_names, BackendActivatedEvent, EventError, EventSystem, HibernationChangedEvent,
    MapEndEvent, MapStartEvent, PluginError, ServerContext, SessionConnectedEvent,
    SessionDisconnectedEvent, SessionSpawnedEvent, SimplePlugin,
};
use runtime::{command_channel, start_polling, CommandReceiver, CommandSender, Driver};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The auto updater, as loaded by the host.
pub struct AutoUpdaterPlugin {
    commands: CommandSender,
    receiver: Option<CommandReceiver>,
    version_source: Option<Arc<dyn VersionSource>>,
    driver_task: Option<JoinHandle<()>>,
}

impl AutoUpdaterPlugin {
    pub fn new() -> Self {
        let (commands, receiver) = command_channel();
        Self {
            commands,
            receiver: Some(receiver),
            version_source: None,
            driver_task: None,
        }
    }

    /// Replaces the HTTP client with another source of version answers.
    pub fn with_version_source(mut self, source: Arc<dyn VersionSource>) -> Self {
        self.version_source = Some(source);
        self
    }

    /// True while the driver task is alive.
    pub fn is_running(&self) -> bool {
        self.driver_task.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn forward(commands: &CommandSender, command: Command) -> Result<(), EventError> {
        commands
            .send(command)
            .map_err(|_| EventError::HandlerExecution("auto updater is not running".to_string()))
    }
}

impl Default for AutoUpdaterPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimplePlugin for AutoUpdaterPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn register_handlers(&mut self, events: Arc<EventSystem>) -> Result<(), PluginError> {
        let tx = self.commands.clone();
        events
            .on_core(
                event_names::SESSION_CONNECTED,
                move |event: SessionConnectedEvent| {
                    Self::forward(&tx, Command::SessionConnected(event.session))
                },
            )
            .await
            .map_err(|e| PluginError::InitializationFailed(e.to_string()))?;

        let tx = self.commands.clone();
        events
            .on_core(
                event_names::SESSION_DISCONNECTED,
                move |event: SessionDisconnectedEvent| {
                    Self::forward(&tx, Command::SessionDisconnected(event.session_id))
                },
            )
            .await
            .map_err(|e| PluginError::InitializationFailed(e.to_string()))?;

        let tx = self.commands.clone();
        events
            .on_core(
                event_names::SESSION_SPAWNED,
                move |event: SessionSpawnedEvent| {
                    Self::forward(&tx, Command::SessionSpawned(event.session))
                },
            )
            .await
            .map_err(|e| PluginError::InitializationFailed(e.to_string()))?;

        let tx = self.commands.clone();
        events
            .on_core(event_names::MAP_START, move |event: MapStartEvent| {
                Self::forward(&tx, Command::MapStart(event.map_name))
            })
            .await
            .map_err(|e| PluginError::InitializationFailed(e.to_string()))?;

        let tx = self.commands.clone();
        events
            .on_core(event_names::MAP_END, move |_event: MapEndEvent| {
                Self::forward(&tx, Command::MapEnd)
            })
            .await
            .map_err(|e| PluginError::InitializationFailed(e.to_string()))?;

        events
            .on_core(
                event_names::HIBERNATION_CHANGED,
                |event: HibernationChangedEvent| {
                    if event.hibernating {
                        warn!("Server is hibernating, update checks may be delayed until a player joins");
                    }
                    Ok(())
                },
            )
            .await
            .map_err(|e| PluginError::InitializationFailed(e.to_string()))?;

        events
            .on_core(
                event_names::BACKEND_ACTIVATED,
                |_event: BackendActivatedEvent| {
                    info!("Server backend activated, update checks are live");
                    Ok(())
                },
            )
            .await
            .map_err(|e| PluginError::InitializationFailed(e.to_string()))?;

        Ok(())
    }

    async fn on_init(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        let receiver = self.receiver.take().ok_or_else(|| {
            PluginError::InitializationFailed("auto updater already initialized".to_string())
        })?;

        let config_path = context.config_directory().join(CONFIG_FILE_NAME);
        let config = UpdaterConfig::load_from_file(&config_path)
            .await
            .map_err(|e| PluginError::InitializationFailed(e.to_string()))?;

        if config.is_outdated() {
            warn!(
                "Configuration version mismatch (expected {}, found {}) in {}",
                CURRENT_CONFIG_VERSION,
                config.config_version,
                config_path.display()
            );
        }

        let source: Arc<dyn VersionSource> = match &self.version_source {
            Some(source) => source.clone(),
            None => Arc::new(
                SteamVersionClient::from_config(&config)
                    .map_err(|e| PluginError::InitializationFailed(e.to_string()))?,
            ),
        };

        let version_file = context.game_directory().join(&config.version_file);
        let polling = match version::read_local_version(&version_file).await {
            Ok(local) => {
                info!("Local game version {}", local);
                true
            }
            Err(e) => {
                error!("{}", e);
                !config.stop_on_missing_local_version
            }
        };

        let config = Arc::new(config);
        let mut driver = Driver::new(config.clone(), context.clone(), self.commands.clone());
        if polling {
            let poll_task = start_polling(&config, context.as_ref(), source, self.commands.clone());
            driver = driver.with_poll_task(poll_task);
        } else {
            error!("Update checks disabled until the plugin is reloaded");
        }

        self.driver_task = Some(tokio::spawn(driver.run(receiver)));
        info!("Auto updater {} initialized", env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    async fn on_shutdown(&mut self, _context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        if let Some(handle) = self.driver_task.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    return Err(PluginError::Runtime(e.to_string()));
                }
            }
        }
        info!("Auto updater shut down");
        Ok(())
    }
}
