//! Session model shared between the host and its plugins.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one connection of one player.
///
/// The host mints a fresh id every time a client connects, so the id is only
/// valid for the lifetime of that connection. Unlike a player slot, it is never
/// reused by the next occupant.
///
/// # Examples
///
/// ```rust
/// use host_api::SessionId;
///
/// let a = SessionId::new();
/// let b = SessionId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random session id using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a session id from its string representation.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection lifecycle of a session as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Handshake in progress, not yet in game
    Connecting,
    /// Fully connected
    Connected,
    /// Dropped and coming back (map change, timeout recovery)
    Reconnecting,
    /// On its way out
    Disconnecting,
}

/// Snapshot of one connected session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Per-connection identifier
    pub id: SessionId,
    /// Console-addressable user id (what `kickid` expects)
    pub user_id: u32,
    /// Display name
    pub name: String,
    /// Server-side bot
    pub is_bot: bool,
    /// Relay/TV observer client
    pub is_observer: bool,
    /// On the spectator team (or unassigned)
    pub is_spectator: bool,
    /// Current connection state
    pub state: ConnectionState,
}

impl SessionInfo {
    /// A connected human player on a playing team.
    pub fn human(user_id: u32, name: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            name: name.into(),
            is_bot: false,
            is_observer: false,
            is_spectator: false,
            state: ConnectionState::Connected,
        }
    }

    /// A server-side bot.
    pub fn bot(user_id: u32, name: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::human(user_id, name)
        }
    }

    /// A relay/TV observer client.
    pub fn observer(user_id: u32, name: impl Into<String>) -> Self {
        Self {
            is_observer: true,
            ..Self::human(user_id, name)
        }
    }

    /// Moves the session to the spectator team.
    pub fn spectating(mut self) -> Self {
        self.is_spectator = true;
        self
    }

    /// Overrides the connection state.
    pub fn with_state(mut self, state: ConnectionState) -> Self {
        self.state = state;
        self
    }

    /// True for real players: neither bots nor observers.
    pub fn is_human(&self) -> bool {
        !self.is_bot && !self.is_observer
    }

    /// True for real players actually taking part in the match.
    pub fn is_active_player(&self) -> bool {
        self.is_human() && !self.is_spectator
    }
}

/// Reasons a session can leave the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Player initiated disconnection
    ClientDisconnect,
    /// Connection timed out
    Timeout,
    /// Removed by a console command
    Kicked(String),
    /// Server is shutting down
    ServerShutdown,
}
