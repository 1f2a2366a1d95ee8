//! In-memory [`ServerContext`] for plugin test suites.
//!
//! Records every chat line and console command instead of acting on them.

use crate::context::{ServerContext, ServerError};
use crate::system::EventSystem;
use crate::types::{SessionId, SessionInfo};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// A fake host that keeps a session list and records plugin output.
#[derive(Debug)]
pub struct RecordingContext {
    events: Arc<EventSystem>,
    sessions: Mutex<Vec<SessionInfo>>,
    printed: Mutex<Vec<(SessionId, String)>>,
    commands: Mutex<Vec<String>>,
    unreachable: Mutex<Vec<SessionId>>,
    max_players: u32,
    visible_max_players: Option<u32>,
    game_directory: PathBuf,
    config_directory: PathBuf,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingContext {
    /// A ten slot server with no sessions, rooted in the current directory.
    pub fn new() -> Self {
        Self {
            events: Arc::new(EventSystem::new()),
            sessions: Mutex::new(Vec::new()),
            printed: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            unreachable: Mutex::new(Vec::new()),
            max_players: 10,
            visible_max_players: None,
            game_directory: PathBuf::from("."),
            config_directory: PathBuf::from("."),
        }
    }

    pub fn with_events(mut self, events: Arc<EventSystem>) -> Self {
        self.events = events;
        self
    }

    pub fn with_max_players(mut self, max_players: u32) -> Self {
        self.max_players = max_players;
        self
    }

    pub fn with_visible_max_players(mut self, visible: u32) -> Self {
        self.visible_max_players = Some(visible);
        self
    }

    pub fn with_game_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.game_directory = dir.into();
        self
    }

    pub fn with_config_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_directory = dir.into();
        self
    }

    /// Adds a session to the connected list.
    pub fn add_session(&self, session: SessionInfo) {
        lock(&self.sessions).push(session);
    }

    /// Removes a session from the connected list.
    pub fn remove_session(&self, id: SessionId) {
        lock(&self.sessions).retain(|s| s.id != id);
    }

    /// Makes prints to a connected session fail as if it dropped mid-send.
    pub fn fail_prints_to(&self, id: SessionId) {
        lock(&self.unreachable).push(id);
    }

    /// Every chat line printed so far, in order.
    pub fn printed(&self) -> Vec<(SessionId, String)> {
        lock(&self.printed).clone()
    }

    /// Chat lines printed to one session.
    pub fn printed_to(&self, id: SessionId) -> Vec<String> {
        lock(&self.printed)
            .iter()
            .filter(|(target, _)| *target == id)
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Every console command executed so far, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServerContext for RecordingContext {
    fn events(&self) -> Arc<EventSystem> {
        self.events.clone()
    }

    async fn sessions(&self) -> Vec<SessionInfo> {
        lock(&self.sessions).clone()
    }

    async fn print_to_session(&self, session: SessionId, message: &str) -> Result<(), ServerError> {
        if !lock(&self.sessions).iter().any(|s| s.id == session)
            || lock(&self.unreachable).contains(&session)
        {
            return Err(ServerError::SessionNotFound(session));
        }
        lock(&self.printed).push((session, message.to_string()));
        Ok(())
    }

    async fn execute_command(&self, command: &str) -> Result<(), ServerError> {
        lock(&self.commands).push(command.to_string());
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
