//! Event traits, typed handlers and the core events the host emits.

use crate::types::{DisconnectReason, SessionId, SessionInfo};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::any::Any;

/// Names of the core events emitted by the host.
pub mod event_names {
    pub const SESSION_CONNECTED: &str = "session_connected";
    pub const SESSION_DISCONNECTED: &str = "session_disconnected";
    pub const SESSION_SPAWNED: &str = "session_spawned";
    pub const MAP_START: &str = "map_start";
    pub const MAP_END: &str = "map_end";
    pub const HIBERNATION_CHANGED: &str = "hibernation_changed";
    pub const BACKEND_ACTIVATED: &str = "backend_activated";
}

// ============================================================================
// Event Traits
// ============================================================================

/// Core trait that all events must implement.
///
/// Most types get it through the blanket implementation below: deriving
/// `Serialize`, `Deserialize` and `Debug` is enough.
pub trait Event: Send + Sync + Any + std::fmt::Debug {
    /// Returns the type name of this event for debugging and routing.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Serializes the event to bytes.
    fn serialize(&self) -> Result<Vec<u8>, EventError>;

    /// Deserializes an event from bytes.
    fn deserialize(data: &[u8]) -> Result<Self, EventError>
    where
        Self: Sized;
}

impl<T> Event for T
where
    T: Serialize + DeserializeOwned + Send + Sync + Any + std::fmt::Debug + 'static,
{
    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }

    fn serialize(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(EventError::Serialization)
    }

    fn deserialize(data: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(data).map_err(EventError::Deserialization)
    }
}

/// Handler trait for processing events from their serialized form.
///
/// Plugins rarely implement this directly; `EventSystem::on_core` and
/// `EventSystem::on_plugin` wrap plain closures in a `TypedEventHandler`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles an event from serialized data.
    async fn handle(&self, data: &[u8]) -> Result<(), EventError>;

    /// Returns a human-readable name for this handler.
    fn handler_name(&self) -> &str;
}

/// Type-safe wrapper bridging a closure over `T` to the `EventHandler` trait.
pub struct TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync,
{
    handler: F,
    name: String,
    _phantom: std::marker::PhantomData<T>,
}

impl<T, F> TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync,
{
    /// Creates a new typed event handler.
    pub fn new(name: String, handler: F) -> Self {
        Self {
            handler,
            name,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> EventHandler for TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync,
{
    async fn handle(&self, data: &[u8]) -> Result<(), EventError> {
        let event = T::deserialize(data)?;
        (self.handler)(event)
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

/// Errors that can occur during event system operations.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Serialization failed when converting event to bytes
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Deserialization failed when converting bytes to event
    #[error("Deserialization error: {0}")]
    Deserialization(serde_json::Error),
    /// Handler execution failed during event processing
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
}

// ============================================================================
// Core Events
// ============================================================================

/// Emitted when a client connects. The session may still be loading and is
/// not necessarily in game yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConnectedEvent {
    /// The new session
    pub session: SessionInfo,
    /// Unix timestamp of the connection
    pub timestamp: u64,
}

/// Emitted after a client has left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDisconnectedEvent {
    /// Id of the session that left
    pub session_id: SessionId,
    /// Why it left
    pub reason: DisconnectReason,
    /// Unix timestamp of the disconnection
    pub timestamp: u64,
}

/// Emitted every time a session spawns in the world. This is the first point
/// at which a player is reliably in game and can read chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSpawnedEvent {
    /// The spawning session, as of spawn time
    pub session: SessionInfo,
    /// Unix timestamp of the spawn
    pub timestamp: u64,
}

/// Emitted once a map has finished loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapStartEvent {
    /// Name of the map that started
    pub map_name: String,
    /// Unix timestamp of the map start
    pub timestamp: u64,
}

/// Emitted when the current map ends and the next one begins loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapEndEvent {
    /// Unix timestamp of the map end
    pub timestamp: u64,
}

/// Emitted when the host enters or leaves hibernation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HibernationChangedEvent {
    /// Whether the host is now hibernating
    pub hibernating: bool,
    /// Unix timestamp of the change
    pub timestamp: u64,
}

/// Emitted once the host's connection to the vendor backend is up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendActivatedEvent {
    /// Unix timestamp of the activation
    pub timestamp: u64,
}
