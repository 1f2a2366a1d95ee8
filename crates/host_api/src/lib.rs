//! # Host API
//!
//! The collaborator surface a game server host exposes to its plugins. The host
//! owns the event loop, the session list, the console and the process lifecycle;
//! plugins only see what is defined here.
//!
//! ## Architecture Overview
//!
//! ### Core Events (`core:*`)
//! Emitted by the host: sessions connecting, disconnecting and spawning, maps
//! starting and ending, hibernation changes and backend activation.
//!
//! ### Plugin Events (`plugin:plugin_name:event`)
//! Inter-plugin communication, so plugins can react to each other without
//! linking against each other.
//!
//! ## Quick Start Example
//!
//! ```rust,ignore
//! use host_api::*;
//!
//! let events = create_event_system();
//!
//! events.on_core(event_names::SESSION_CONNECTED, |event: SessionConnectedEvent| {
//!     println!("{} connected", event.session.name);
//!     Ok(())
//! }).await?;
//!
//! events.emit_core(event_names::MAP_START, &MapStartEvent {
//!     map_name: "de_dust2".to_string(),
//!     timestamp: current_timestamp(),
//! }).await?;
//! ```

pub mod context;
pub mod events;
pub mod plugin;
pub mod system;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use async_trait::async_trait;
pub use context::{ServerContext, ServerError};
pub use events::{
    event_names, BackendActivatedEvent, Event, EventError, EventHandler, HibernationChangedEvent,
    MapEndEvent, MapStartEvent, SessionConnectedEvent, SessionDisconnectedEvent,
    SessionSpawnedEvent, TypedEventHandler,
};
pub use plugin::{PluginError, SimplePlugin};
pub use system::{EventSystem, EventSystemStats};
pub use types::{ConnectionState, DisconnectReason, SessionId, SessionInfo};

use std::sync::Arc;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to `0` if the system clock is set before the Unix epoch.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Creates a new event system instance ready to be shared between the host
/// and its plugins.
pub fn create_event_system() -> Arc<EventSystem> {
    Arc::new(EventSystem::new())
}
