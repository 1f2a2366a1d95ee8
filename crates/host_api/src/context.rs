//! The server context handed to plugins during initialization.

use crate::system::EventSystem;
use crate::types::{SessionId, SessionInfo};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Server context providing access to host services.
///
/// This is everything a plugin may ask of the host: the shared event bus, the
/// current session list, chat output, the server console and a few facts about
/// the server install.
///
/// # Examples
///
/// ```rust,ignore
/// async fn on_init(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
///     for session in context.sessions().await {
///         context.print_to_session(session.id, "hello").await?;
///     }
///     context.execute_command("say plugin loaded").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ServerContext: Send + Sync {
    /// Returns the event system shared with the host.
    fn events(&self) -> Arc<EventSystem>;

    /// Returns a snapshot of every connected session, bots and observers
    /// included.
    async fn sessions(&self) -> Vec<SessionInfo>;

    /// Prints a chat line to a single session.
    ///
    /// # Returns
    ///
    /// `Err(ServerError::SessionNotFound)` if the session is gone.
    async fn print_to_session(&self, session: SessionId, message: &str) -> Result<(), ServerError>;

    /// Executes a console command as if typed at the server console.
    async fn execute_command(&self, command: &str) -> Result<(), ServerError>;

    /// Hard player limit of the server.
    fn max_players(&self) -> u32;

    /// Advertised player slots, when the operator limits them below
    /// [`ServerContext::max_players`].
    fn visible_max_players(&self) -> Option<u32>;

    /// Root directory of the game server install.
    fn game_directory(&self) -> PathBuf;

    /// Directory where plugins keep their configuration files.
    fn config_directory(&self) -> PathBuf;
}

/// Errors that can occur when plugins call into the host.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The target session is no longer connected
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),
    /// The console rejected the command
    #[error("Command failed: {0}")]
    Command(String),
}
