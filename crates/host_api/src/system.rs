//! Event routing between the host and its plugins.

use crate::events::{Event, EventError, EventHandler, TypedEventHandler};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Statistics about the event system's usage.
#[derive(Debug, Default, Clone)]
pub struct EventSystemStats {
    /// Total number of registered event handlers
    pub total_handlers: usize,
    /// Total number of events emitted since creation
    pub events_emitted: u64,
}

/// The event bus shared by the host and all plugins.
///
/// Handlers are keyed by `core:<event>` or `plugin:<plugin>:<event>`. Every
/// handler registered for a key receives every event emitted on it; a failing
/// handler is logged and does not stop the others.
///
/// # Examples
///
/// ```rust,ignore
/// let events = EventSystem::new();
///
/// events.on_core("map_start", |event: MapStartEvent| {
///     println!("now playing {}", event.map_name);
///     Ok(())
/// }).await?;
/// ```
pub struct EventSystem {
    /// Map of event keys to their registered handlers
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    /// System statistics for monitoring
    stats: RwLock<EventSystemStats>,
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("handlers", &"[handlers]")
            .field("stats", &"[stats]")
            .finish()
    }
}

impl EventSystem {
    /// Creates a new event system with no registered handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            stats: RwLock::new(EventSystemStats::default()),
        }
    }

    /// Registers a handler for core host events.
    ///
    /// # Arguments
    ///
    /// * `event_name` - Name of the core event (see [`crate::event_names`])
    /// * `handler` - Function to handle events of type T
    pub async fn on_core<T, F>(&self, event_name: &str, handler: F) -> Result<(), EventError>
    where
        T: Event + 'static,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let event_key = format!("core:{}", event_name);
        self.register_typed_handler(event_key, handler).await
    }

    /// Registers a handler for events published by another plugin.
    ///
    /// # Arguments
    ///
    /// * `plugin_name` - Name of the publishing plugin
    /// * `event_name` - Event name within that plugin's namespace
    /// * `handler` - Function to handle events of type T
    pub async fn on_plugin<T, F>(
        &self,
        plugin_name: &str,
        event_name: &str,
        handler: F,
    ) -> Result<(), EventError>
    where
        T: Event + 'static,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let event_key = format!("plugin:{}:{}", plugin_name, event_name);
        self.register_typed_handler(event_key, handler).await
    }

    /// Emits a core host event to all registered handlers.
    pub async fn emit_core<T>(&self, event_name: &str, event: &T) -> Result<(), EventError>
    where
        T: Event,
    {
        let event_key = format!("core:{}", event_name);
        self.emit_event(&event_key, event).await
    }

    /// Emits a plugin event to all registered handlers.
    pub async fn emit_plugin<T>(
        &self,
        plugin_name: &str,
        event_name: &str,
        event: &T,
    ) -> Result<(), EventError>
    where
        T: Event,
    {
        let event_key = format!("plugin:{}:{}", plugin_name, event_name);
        self.emit_event(&event_key, event).await
    }

    /// Gets the current event system statistics.
    pub async fn get_stats(&self) -> EventSystemStats {
        self.stats.read().await.clone()
    }

    async fn register_typed_handler<T, F>(
        &self,
        event_key: String,
        handler: F,
    ) -> Result<(), EventError>
    where
        T: Event + 'static,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let handler_name = format!("{}::{}", event_key, T::type_name());
        let handler_arc: Arc<dyn EventHandler> =
            Arc::new(TypedEventHandler::new(handler_name, handler));

        self.handlers
            .write()
            .await
            .entry(event_key.clone())
            .or_default()
            .push(handler_arc);

        self.stats.write().await.total_handlers += 1;

        info!("Registered handler for {}", event_key);
        Ok(())
    }

    async fn emit_event<T>(&self, event_key: &str, event: &T) -> Result<(), EventError>
    where
        T: Event,
    {
        let data = event.serialize()?;

        let event_handlers = self.handlers.read().await.get(event_key).cloned();

        if let Some(event_handlers) = event_handlers {
            debug!("Emitting {} to {} handlers", event_key, event_handlers.len());

            let mut futures = FuturesUnordered::new();
            for handler in event_handlers.iter() {
                let data = &data;
                futures.push(async move {
                    if let Err(e) = handler.handle(data).await {
                        error!("Handler {} failed: {}", handler.handler_name(), e);
                    }
                });
            }
            while futures.next().await.is_some() {}
        } else {
            debug!("No handlers registered for {}", event_key);
        }

        self.stats.write().await.events_emitted += 1;
        Ok(())
    }
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MapStartEvent;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Serialize, Deserialize)]
    struct TestEvent {
        message: String,
    }

    #[tokio::test]
    async fn test_core_events_reach_every_handler() {
        let events = EventSystem::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let hits = hits.clone();
            events
                .on_core("map_start", move |event: MapStartEvent| {
                    assert_eq!(event.map_name, "de_inferno");
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .expect("Failed to register core handler");
        }

        events
            .emit_core(
                "map_start",
                &MapStartEvent {
                    map_name: "de_inferno".to_string(),
                    timestamp: 0,
                },
            )
            .await
            .expect("Failed to emit core event");

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        let stats = events.get_stats().await;
        assert_eq!(stats.total_handlers, 2);
        assert_eq!(stats.events_emitted, 1);
    }

    #[tokio::test]
    async fn test_plugin_namespace_is_isolated_from_core() {
        let events = EventSystem::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        events
            .on_plugin("auto_updater", "update_found", move |_: TestEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .expect("Failed to register plugin handler");

        let event = TestEvent {
            message: "build 9001".to_string(),
        };
        events.emit_core("update_found", &event).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        events
            .emit_plugin("auto_updater", "update_found", &event)
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let events = EventSystem::new();
        let hits = Arc::new(AtomicUsize::new(0));

        events
            .on_core("map_end", |_: TestEvent| {
                Err(EventError::HandlerExecution("boom".to_string()))
            })
            .await
            .unwrap();

        let counter = hits.clone();
        events
            .on_core("map_end", move |_: TestEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        let result = events
            .emit_core(
                "map_end",
                &TestEvent {
                    message: String::new(),
                },
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mismatched_payload_is_logged_not_propagated() {
        let events = EventSystem::new();
        events
            .on_core("map_start", |_: MapStartEvent| Ok(()))
            .await
            .unwrap();

        // Wrong shape: handler fails to deserialize, emission still succeeds.
        let result = events
            .emit_core(
                "map_start",
                &TestEvent {
                    message: "not a map".to_string(),
                },
            )
            .await;
        assert!(result.is_ok());
    }
}
