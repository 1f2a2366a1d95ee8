//! Standalone auto updater host.
//!
//! Runs the auto updater plugin against a dedicated server installation that
//! is not itself plugin-capable. The host reports the configured map as
//! running, lets the plugin poll for updates, and exits when the plugin
//! terminates the server or a shutdown signal arrives, so a process
//! supervisor can update and restart the game server.

mod cli;
mod config;
mod context;
mod logging;
mod signals;

use cli::CliArgs;
use config::AppConfig;
use context::StandaloneContext;
use host_api::{
    create_event_system, current_timestamp, event_names, BackendActivatedEvent, MapStartEvent,
    ServerContext, SimplePlugin,
};
use plugin_auto_updater::AutoUpdaterPlugin;
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Application
// ============================================================================

/// Host application state.
struct Application {
    config: AppConfig,
}

impl Application {
    /// Loads the configuration, applies command line overrides and sets up
    /// logging.
    async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(game_dir) = &args.game_dir {
            config.host.game_directory = game_dir.to_string_lossy().into_owned();
        }
        if let Some(level) = &args.log_level {
            config.logging.level = level.clone();
        }

        config.validate()?;
        logging::setup_logging(&config.logging, args.json_logs)?;

        Ok(Self { config })
    }

    async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!(
            "Auto updater host v{} watching {}",
            env!("CARGO_PKG_VERSION"),
            self.config.game_directory().display()
        );

        let events = create_event_system();
        let context = Arc::new(StandaloneContext::new(
            events.clone(),
            self.config.host.max_players,
            self.config.host.visible_max_players,
            self.config.game_directory(),
            self.config.config_directory(),
        ));
        let server_context: Arc<dyn ServerContext> = context.clone();

        let mut plugin = AutoUpdaterPlugin::new();
        plugin.register_handlers(events.clone()).await?;
        plugin.on_init(server_context.clone()).await?;
        info!("Loaded plugin {} v{}", plugin.name(), plugin.version());

        events
            .emit_core(
                event_names::MAP_START,
                &MapStartEvent {
                    map_name: self.config.host.map.clone(),
                    timestamp: current_timestamp(),
                },
            )
            .await?;
        events
            .emit_core(
                event_names::BACKEND_ACTIVATED,
                &BackendActivatedEvent {
                    timestamp: current_timestamp(),
                },
            )
            .await?;

        tokio::select! {
            result = signals::wait_for_shutdown_signal() => {
                result?;
                info!("Shutdown signal received");
            }
            _ = context.terminated() => {
                info!("Game server restart requested, exiting");
            }
        }

        if let Err(e) = plugin.on_shutdown(server_context).await {
            error!("Plugin shutdown failed: {}", e);
        }

        let stats = events.get_stats().await;
        info!(
            "Host stopped after {} events ({} handlers)",
            stats.events_emitted, stats.total_handlers
        );
        Ok(())
    }
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("Application error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Failed to start application: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
