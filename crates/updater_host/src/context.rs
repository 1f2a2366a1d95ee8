//! [`ServerContext`] of the standalone host.
//!
//! The standalone host runs next to a dedicated server rather than inside it,
//! so it has no session list and no console. Console commands are logged, and
//! the terminate command ends the host.

use async_trait::async_trait;
use host_api::{EventSystem, ServerContext, ServerError, SessionId, SessionInfo};
use plugin_auto_updater::notice::TERMINATE_COMMAND;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

pub struct StandaloneContext {
    events: Arc<EventSystem>,
    max_players: u32,
    visible_max_players: Option<u32>,
    game_directory: PathBuf,
    config_directory: PathBuf,
    terminate: Notify,
}

impl StandaloneContext {
    pub fn new(
        events: Arc<EventSystem>,
        max_players: u32,
        visible_max_players: Option<u32>,
        game_directory: PathBuf,
        config_directory: PathBuf,
    ) -> Self {
        Self {
            events,
            max_players,
            visible_max_players,
            game_directory,
            config_directory,
            terminate: Notify::new(),
        }
    }

    /// Resolves once a plugin has issued the terminate command.
    pub async fn terminated(&self) {
        self.terminate.notified().await;
    }
}

#[async_trait]
impl ServerContext for StandaloneContext {
    fn events(&self) -> Arc<EventSystem> {
        self.events.clone()
    }

    async fn sessions(&self) -> Vec<SessionInfo> {
        Vec::new()
    }

    async fn print_to_session(&self, session: SessionId, _message: &str) -> Result<(), ServerError> {
        Err(ServerError::SessionNotFound(session))
    }

    async fn execute_command(&self, command: &str) -> Result<(), ServerError> {
        if command.trim().is_empty() {
            return Err(ServerError::Command("empty console command".to_string()));
        }
        info!("Console: {}", command);
        if command.trim() == TERMINATE_COMMAND {
            self.terminate.notify_one();
        }
        Ok(())
    }

    fn max_players(&self) -> u32 {
        self.max_players
    }

    fn visible_max_players(&self) -> Option<u32> {
        self.visible_max_players
    }

    fn game_directory(&self) -> PathBuf {
        self.game_directory.clone()
    }

    fn config_directory(&self) -> PathBuf {
        self.config_directory.clone()
    }
}
