//! Plugin runtime: the command channel, the driver task that owns the
//! sequencer, and the poll task.
//!
//! Host events, poll results and timer completions all arrive as [`Command`]s
//! on one unbounded channel. A single driver task drains it, so the sequencer
//! and its tracker are only ever touched from there.

use crate::client::VersionSource;
use crate::config::UpdaterConfig;
use crate::error::UpdateCheckError;
use crate::poller::{UpdateStatus, VersionPoller};
use crate::sequencer::{Directive, ShutdownSequencer};
use host_api::{current_timestamp, ServerContext, SessionId, SessionInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Plugin event namespace.
pub const PLUGIN_NAME: &str = "auto_updater";

/// Published as `plugin:auto_updater:update_found` once per detected update.
pub const UPDATE_FOUND_EVENT: &str = "update_found";

/// Payload of [`UPDATE_FOUND_EVENT`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFoundEvent {
    pub required_version: u32,
    pub local_version: String,
    pub timestamp: u64,
}

/// Everything the driver reacts to.
#[derive(Debug, Clone)]
pub enum Command {
    UpdateFound(UpdateStatus),
    SessionConnected(SessionInfo),
    SessionDisconnected(SessionId),
    SessionSpawned(SessionInfo),
    MapStart(String),
    MapEnd,
    CountdownElapsed,
    Terminate,
}

pub type CommandSender = mpsc::UnboundedSender<Command>;
pub type CommandReceiver = mpsc::UnboundedReceiver<Command>;

pub fn command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::unbounded_channel()
}

// ============================================================================
// Driver
// ============================================================================

/// Owns the sequencer and the timers it asked for.
///
/// Dropping the driver (including aborting the task running it) aborts the
/// poll task and every pending timer.
pub struct Driver {
    sequencer: ShutdownSequencer,
    context: Arc<dyn ServerContext>,
    commands: CommandSender,
    poll_task: Option<JoinHandle<()>>,
    countdown_timer: Option<JoinHandle<()>>,
    terminate_timer: Option<JoinHandle<()>>,
}

impl Driver {
    pub fn new(
        config: Arc<UpdaterConfig>,
        context: Arc<dyn ServerContext>,
        commands: CommandSender,
    ) -> Self {
        Self {
            sequencer: ShutdownSequencer::new(config),
            context,
            commands,
            poll_task: None,
            countdown_timer: None,
            terminate_timer: None,
        }
    }

    /// Hands over the poll task so it can be stopped once an update is found.
    pub fn with_poll_task(mut self, handle: JoinHandle<()>) -> Self {
        self.poll_task = Some(handle);
        self
    }

    pub fn sequencer(&self) -> &ShutdownSequencer {
        &self.sequencer
    }

    pub fn is_polling(&self) -> bool {
        self.poll_task.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn has_pending_countdown(&self) -> bool {
        self.countdown_timer.is_some()
    }

    /// Applies commands from `receiver` until the task running it is
    /// aborted. The driver keeps a sender of its own for the timers, so the
    /// channel stays open for as long as the driver lives.
    pub async fn run(mut self, mut receiver: CommandReceiver) {
        while let Some(command) = receiver.recv().await {
            self.handle(command).await;
        }
    }

    /// Applies one command at the safe point.
    pub async fn handle(&mut self, command: Command) {
        let context = self.context.clone();
        let directives = match command {
            Command::UpdateFound(status) => {
                self.sequencer
                    .on_update_found(&status, context.as_ref())
                    .await
            }
            Command::SessionConnected(session) => {
                self.sequencer.on_session_connected(&session);
                Vec::new()
            }
            Command::SessionDisconnected(id) => {
                self.sequencer.on_session_disconnected(id);
                Vec::new()
            }
            Command::SessionSpawned(session) => {
                self.sequencer
                    .on_session_spawned(&session, context.as_ref())
                    .await;
                Vec::new()
            }
            Command::MapStart(map_name) => {
                debug!("Map {} started", map_name);
                self.sequencer.on_map_start(context.as_ref()).await
            }
            Command::MapEnd => self.sequencer.on_map_end(context.as_ref()).await,
            Command::CountdownElapsed => {
                self.countdown_timer = None;
                self.sequencer.on_countdown_elapsed(context.as_ref()).await
            }
            Command::Terminate => {
                self.terminate_timer = None;
                self.sequencer.on_terminate(context.as_ref()).await;
                Vec::new()
            }
        };

        for directive in directives {
            self.apply(directive).await;
        }
    }

    async fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::AnnounceUpdate {
                required_version,
                local_version,
            } => {
                let event = UpdateFoundEvent {
                    required_version,
                    local_version: local_version.to_string(),
                    timestamp: current_timestamp(),
                };
                if let Err(e) = self
                    .context
                    .events()
                    .emit_plugin(PLUGIN_NAME, UPDATE_FOUND_EVENT, &event)
                    .await
                {
                    warn!("Failed to publish update_found: {}", e);
                }
            }
            Directive::StopPolling => {
                if let Some(handle) = self.poll_task.take() {
                    handle.abort();
                    debug!("Update checks stopped");
                }
            }
            Directive::ScheduleCountdown(delay) => {
                if let Some(previous) = self.countdown_timer.take() {
                    previous.abort();
                }
                self.countdown_timer = Some(self.schedule(delay, Command::CountdownElapsed));
            }
            Directive::CancelCountdown => {
                if let Some(handle) = self.countdown_timer.take() {
                    handle.abort();
                }
            }
            Directive::ScheduleTerminate(delay) => {
                if self.terminate_timer.is_none() {
                    self.terminate_timer = Some(self.schedule(delay, Command::Terminate));
                }
            }
        }
    }

    fn schedule(&self, delay: Duration, command: Command) -> JoinHandle<()> {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if commands.send(command).is_err() {
                debug!("Timer fired after the driver stopped");
            }
        })
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        for handle in [
            self.poll_task.take(),
            self.countdown_timer.take(),
            self.terminate_timer.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

// ============================================================================
// Poll Task
// ============================================================================

/// Spawns the recurring update check.
///
/// The first check runs one `interval` after spawning. Missed ticks are
/// skipped, so a slow check never triggers a burst of catch-up checks.
///
/// # Arguments
///
/// * `poller` - Performs one check per tick
/// * `interval` - Time between two checks
/// * `stop_on_missing_local_version` - End the task when the local build
///   cannot be determined
/// * `commands` - Where detected updates are sent
pub fn spawn_poll_task(
    poller: Arc<VersionPoller>,
    interval: Duration,
    stop_on_missing_local_version: bool,
    commands: CommandSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(first_check) = Instant::now().checked_add(interval) else {
            error!("Update check interval of {:?} is out of range", interval);
            return;
        };
        let mut ticker = interval_at(first_check, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            match poller.poll().await {
                Ok(status) if status.update_available() => {
                    if commands.send(Command::UpdateFound(status)).is_err() {
                        break;
                    }
                }
                Ok(status) => {
                    debug!("Server is up to date ({})", status.local_version);
                }
                Err(UpdateCheckError::AlreadyInFlight) => {
                    debug!("Previous update check still running, skipping tick");
                }
                Err(e @ UpdateCheckError::LocalVersionUnavailable(_)) => {
                    error!("{}", e);
                    if stop_on_missing_local_version {
                        error!("Update checks disabled until the plugin is reloaded");
                        break;
                    }
                }
                Err(e) => {
                    warn!("Update check failed: {}", e);
                }
            }
        }
    })
}

/// Builds the poller for `context` and spawns its task.
pub fn start_polling(
    config: &UpdaterConfig,
    context: &dyn ServerContext,
    source: Arc<dyn VersionSource>,
    commands: CommandSender,
) -> JoinHandle<()> {
    let version_file = context.game_directory().join(&config.version_file);
    let poller = Arc::new(VersionPoller::new(version_file, source));
    info!(
        "Checking for updates every {}s using {}",
        config.update_check_interval_seconds,
        poller.version_file().display()
    );

    spawn_poll_task(
        poller,
        config.update_check_interval(),
        config.stop_on_missing_local_version,
        commands,
    )
}
