//! Plugin lifecycle trait.

use crate::context::ServerContext;
use crate::system::EventSystem;
use async_trait::async_trait;
use std::sync::Arc;

/// Plugin trait implemented by everything the host loads.
///
/// # Lifecycle
///
/// 1. **Creation**: the host constructs the plugin
/// 2. **Handler Registration**: `register_handlers()` sets up event handlers
/// 3. **Initialization**: `on_init()` is called with the server context
/// 4. **Operation**: the plugin receives events
/// 5. **Shutdown**: `on_shutdown()` is called for cleanup
#[async_trait]
pub trait SimplePlugin: Send + Sync + 'static {
    /// Returns the name of this plugin. Used as the plugin event namespace.
    fn name(&self) -> &str;

    /// Returns the version string of this plugin.
    fn version(&self) -> &str;

    /// Registers event handlers. Called before `on_init()`.
    async fn register_handlers(&mut self, events: Arc<EventSystem>) -> Result<(), PluginError>;

    /// Initialize the plugin with server context.
    ///
    /// Use this for loading configuration and starting timers or background
    /// tasks. Failed initialization prevents the plugin from loading.
    async fn on_init(&mut self, _context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        Ok(())
    }

    /// Shutdown the plugin gracefully. Errors are logged by the host but do
    /// not prevent unloading.
    async fn on_shutdown(&mut self, _context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Errors that can occur during plugin operations.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Plugin initialization failed during startup
    #[error("Plugin initialization failed: {0}")]
    InitializationFailed(String),
    /// Error occurred during plugin execution
    #[error("Plugin execution error: {0}")]
    ExecutionError(String),
    /// Runtime error such as a lost background task
    #[error("Plugin runtime error: {0}")]
    Runtime(String),
}
