//! End-to-end tests of the auto updater driven through the host event bus.
//!
//! Time is paused, so minutes of countdown pass instantly and the sequence of
//! chat lines and console commands can be checked exactly.

use host_api::testing::RecordingContext;
use host_api::{
    create_event_system, current_timestamp, event_names, DisconnectReason, EventSystem,
    MapEndEvent, MapStartEvent, SessionConnectedEvent, SessionDisconnectedEvent, SessionInfo,
    SessionSpawnedEvent, SimplePlugin,
};
use plugin_auto_updater::{
    AutoUpdaterPlugin, LocalVersion, UpToDateCheck, UpdateCheckError, UpdateFoundEvent,
    VersionSource, CONFIG_FILE_NAME, PLUGIN_NAME, UPDATE_FOUND_EVENT,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::time::{sleep, Duration};

/// Answers every check the same way and counts the calls.
struct ScriptedSource {
    answer: Result<UpToDateCheck, UpdateCheckError>,
    calls: AtomicUsize,
    asked: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl VersionSource for ScriptedSource {
    async fn check(&self, local: &LocalVersion) -> Result<UpToDateCheck, UpdateCheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.asked.lock().unwrap().push(local.to_string());
        self.answer.clone()
    }
}

fn outdated(required_version: u32) -> Result<UpToDateCheck, UpdateCheckError> {
    Ok(UpToDateCheck {
        success: true,
        up_to_date: false,
        version_is_listable: false,
        required_version,
        message: Some("Your server is out of date, please upgrade".to_string()),
    })
}

struct Harness {
    _dir: TempDir,
    config_dir: std::path::PathBuf,
    events: Arc<EventSystem>,
    context: Arc<RecordingContext>,
    source: Arc<ScriptedSource>,
    plugin: AutoUpdaterPlugin,
}

impl Harness {
    async fn start(answer: Result<UpToDateCheck, UpdateCheckError>) -> Self {
        Self::start_with_version_file(answer, Some("PatchVersion=1.39.8.5\nProductName=csgo\n"))
            .await
    }

    async fn start_with_version_file(
        answer: Result<UpToDateCheck, UpdateCheckError>,
        version_file: Option<&str>,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        if let Some(contents) = version_file {
            std::fs::create_dir_all(dir.path().join("csgo")).unwrap();
            std::fs::write(dir.path().join("csgo").join("steam.inf"), contents).unwrap();
        }
        let config_dir = dir.path().join("configs");

        let events = create_event_system();
        let context = Arc::new(
            RecordingContext::new()
                .with_events(events.clone())
                .with_max_players(10)
                .with_game_directory(dir.path())
                .with_config_directory(&config_dir),
        );
        let source = Arc::new(ScriptedSource {
            answer,
            calls: AtomicUsize::new(0),
            asked: Mutex::new(Vec::new()),
        });

        let mut plugin = AutoUpdaterPlugin::new().with_version_source(source.clone());
        plugin.register_handlers(events.clone()).await.unwrap();
        plugin.on_init(context.clone()).await.unwrap();

        Self {
            _dir: dir,
            config_dir,
            events,
            context,
            source,
            plugin,
        }
    }

    async fn connect(&self, session: SessionInfo) -> SessionInfo {
        self.context.add_session(session.clone());
        self.events
            .emit_core(
                event_names::SESSION_CONNECTED,
                &SessionConnectedEvent {
                    session: session.clone(),
                    timestamp: current_timestamp(),
                },
            )
            .await
            .unwrap();
        session
    }

    async fn spawn(&self, session: &SessionInfo) {
        self.events
            .emit_core(
                event_names::SESSION_SPAWNED,
                &SessionSpawnedEvent {
                    session: session.clone(),
                    timestamp: current_timestamp(),
                },
            )
            .await
            .unwrap();
        settle().await;
    }

    async fn disconnect(&self, session: &SessionInfo) {
        self.context.remove_session(session.id);
        self.events
            .emit_core(
                event_names::SESSION_DISCONNECTED,
                &SessionDisconnectedEvent {
                    session_id: session.id,
                    reason: DisconnectReason::ClientDisconnect,
                    timestamp: current_timestamp(),
                },
            )
            .await
            .unwrap();
    }

    async fn connect_players(&self, count: u32) -> Vec<SessionInfo> {
        let mut players = Vec::new();
        for i in 0..count {
            players.push(
                self.connect(SessionInfo::human(i + 2, format!("player{i}")))
                    .await,
            );
        }
        players
    }

    async fn end_map(&self) {
        self.events
            .emit_core(
                event_names::MAP_END,
                &MapEndEvent {
                    timestamp: current_timestamp(),
                },
            )
            .await
            .unwrap();
        settle().await;
    }

    async fn start_map(&self, map_name: &str) {
        self.events
            .emit_core(
                event_names::MAP_START,
                &MapStartEvent {
                    map_name: map_name.to_string(),
                    timestamp: current_timestamp(),
                },
            )
            .await
            .unwrap();
        settle().await;
    }

    fn kicks(&self) -> Vec<String> {
        self.context
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("kickid "))
            .collect()
    }
}

/// Lets the driver drain its queue.
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_single_player_restarts_without_warning() {
    let harness = Harness::start(outdated(9001)).await;
    let announced = Arc::new(Mutex::new(Vec::new()));
    {
        let announced = announced.clone();
        harness
            .events
            .on_plugin(
                PLUGIN_NAME,
                UPDATE_FOUND_EVENT,
                move |event: UpdateFoundEvent| {
                    announced.lock().unwrap().push(event.required_version);
                    Ok(())
                },
            )
            .await
            .unwrap();
    }
    let player = harness.connect(SessionInfo::human(2, "alice")).await;

    // First check runs one interval after start.
    sleep(Duration::from_secs(179)).await;
    assert_eq!(harness.source.calls.load(Ordering::SeqCst), 0);

    sleep(Duration::from_secs(5)).await;

    assert_eq!(*harness.source.asked.lock().unwrap(), vec!["1.39.8.5".to_string()]);
    assert_eq!(*announced.lock().unwrap(), vec![9001]);
    assert!(harness.context.printed_to(player.id).is_empty());
    assert_eq!(
        harness.context.commands(),
        vec![
            "kickid 2 Due to the game update (Build: 9001), the server is now restarting."
                .to_string(),
            "quit".to_string(),
        ]
    );

    // Polling stopped once the update was found.
    sleep(Duration::from_secs(600)).await;
    assert_eq!(harness.source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_backend_changes_nothing() {
    let harness = Harness::start(Err(UpdateCheckError::Network(
        "HTTP request failed with status code: 503 Service Unavailable".to_string(),
    )))
    .await;
    harness.connect_players(7).await;

    sleep(Duration::from_secs(600)).await;

    assert_eq!(harness.source.calls.load(Ordering::SeqCst), 3);
    assert!(harness.context.printed().is_empty());
    assert!(harness.context.commands().is_empty());
    assert!(harness.plugin.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_unsuccessful_answer_changes_nothing() {
    let harness = Harness::start(Ok(UpToDateCheck {
        success: false,
        up_to_date: false,
        version_is_listable: false,
        required_version: 9001,
        message: None,
    }))
    .await;
    harness.connect(SessionInfo::human(2, "alice")).await;

    sleep(Duration::from_secs(400)).await;

    assert_eq!(harness.source.calls.load(Ordering::SeqCst), 2);
    assert!(harness.context.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_busy_server_warns_then_kicks_everyone() {
    let harness = Harness::start(outdated(9001)).await;
    let players = harness.connect_players(7).await;
    let spectator = harness
        .connect(SessionInfo::human(20, "watcher").spectating())
        .await;
    harness.connect(SessionInfo::bot(21, "BOT Ringo")).await;

    sleep(Duration::from_secs(181)).await;

    for session in players.iter().chain(std::iter::once(&spectator)) {
        assert_eq!(
            harness.context.printed_to(session.id),
            vec![" [AutoUpdater] New game update released (Build: 9001), the server will restart in 2 minutes".to_string()]
        );
    }
    assert!(harness.context.commands().is_empty());

    // Late joiner, 51 seconds into the countdown.
    sleep(Duration::from_secs(50)).await;
    let late = harness.connect(SessionInfo::human(30, "late")).await;
    harness.spawn(&late).await;
    harness.spawn(&late).await;
    assert_eq!(
        harness.context.printed_to(late.id),
        vec![" [AutoUpdater] New game update released (Build: 9001), the server will restart in 1 minute".to_string()]
    );

    sleep(Duration::from_secs(80)).await;

    let kicks = harness.kicks();
    assert_eq!(kicks.len(), 9);
    assert!(kicks.iter().all(|k| k.ends_with(
        "Due to the game update (Build: 9001), the server is now restarting."
    )));
    assert!(!kicks.iter().any(|k| k.starts_with("kickid 21 ")));
    assert_eq!(
        harness.context.commands().last().map(String::as_str),
        Some("quit")
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnecting_player_is_warned_again() {
    let harness = Harness::start(outdated(9001)).await;
    let players = harness.connect_players(7).await;

    sleep(Duration::from_secs(181)).await;
    assert_eq!(harness.context.printed().len(), 7);

    harness.disconnect(&players[0]).await;
    let returning = harness.connect(SessionInfo::human(2, "player0")).await;
    harness.spawn(&returning).await;

    assert_eq!(harness.context.printed_to(returning.id).len(), 1);
    assert_eq!(harness.context.printed().len(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_map_change_during_countdown_terminates_immediately() {
    let harness = Harness::start(outdated(9001)).await;
    harness.connect_players(7).await;

    sleep(Duration::from_secs(181)).await;
    harness.end_map().await;

    assert_eq!(harness.context.commands(), vec!["quit".to_string()]);

    sleep(Duration::from_secs(300)).await;
    assert_eq!(harness.context.commands(), vec!["quit".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_update_found_during_map_load_waits_for_map_start() {
    let harness = Harness::start(outdated(9001)).await;
    let players = harness.connect_players(7).await;
    harness.end_map().await;

    sleep(Duration::from_secs(181)).await;
    assert!(harness.context.printed().is_empty());
    assert!(harness.context.commands().is_empty());

    harness.start_map("de_dust2").await;

    for player in &players {
        assert_eq!(harness.context.printed_to(player.id).len(), 1);
    }

    sleep(Duration::from_secs(125)).await;
    assert_eq!(harness.kicks().len(), 7);
    assert_eq!(
        harness.context.commands().last().map(String::as_str),
        Some("quit")
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_version_file_disables_checks() {
    let harness = Harness::start_with_version_file(outdated(9001), None).await;
    harness.connect(SessionInfo::human(2, "alice")).await;

    sleep(Duration::from_secs(600)).await;

    assert_eq!(harness.source.calls.load(Ordering::SeqCst), 0);
    assert!(harness.context.commands().is_empty());
    assert!(harness.plugin.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_default_config_is_written_on_first_start() {
    let harness = Harness::start(outdated(9001)).await;

    let written = tokio::fs::read_to_string(harness.config_dir.join(CONFIG_FILE_NAME))
        .await
        .unwrap();
    assert!(written.contains("\"restartDelaySeconds\": 120"));
    assert!(written.contains("\"minPlayerPercentageShutdownAllowed\": 0.6"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_all_activity() {
    let mut harness = Harness::start(outdated(9001)).await;
    harness.connect(SessionInfo::human(2, "alice")).await;

    let context = harness.context.clone();
    harness.plugin.on_shutdown(context).await.unwrap();
    assert!(!harness.plugin.is_running());

    sleep(Duration::from_secs(600)).await;
    assert_eq!(harness.source.calls.load(Ordering::SeqCst), 0);
    assert!(harness.context.commands().is_empty());
}
