//! Shutdown Sequencer.
//!
//! Owns the update lifecycle of the server process:
//!
//! ```text
//! Idle ──update found──▶ UpdatePending ──policy evaluated──▶ CountingDown ──deadline──▶ Restarting
//!                              ▲   (deferred while a map loads)        │
//!                              └───────────────────────────────────────┘ map end: terminate now
//! ```
//!
//! The sequencer never sleeps or spawns. Timing is requested through the
//! [`Directive`]s each transition returns, and the runtime turns those into
//! timers that feed back `on_countdown_elapsed` / `on_terminate`.

use crate::config::UpdaterConfig;
use crate::notice::{kick_command, update_notice, TERMINATE_COMMAND};
use crate::poller::UpdateStatus;
use crate::tracker::NotificationTracker;
use crate::version::LocalVersion;
use host_api::{ConnectionState, ServerContext, SessionId, SessionInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Countdown used when the population is small enough to skip the warning.
pub const INSTANT_COUNTDOWN: Duration = Duration::from_secs(1);

/// The update every later phase refers to. Frozen once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingUpdate {
    pub required_version: u32,
    pub found_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// No update known
    Idle,
    /// Update detected, deadline not established yet
    UpdatePending(PendingUpdate),
    /// Deadline is `update.found_at + countdown`
    CountingDown {
        update: PendingUpdate,
        countdown: Duration,
    },
    /// Players kicked or map changed; the process is going away
    Restarting(PendingUpdate),
}

impl SequencerState {
    pub fn update(&self) -> Option<PendingUpdate> {
        match *self {
            SequencerState::Idle => None,
            SequencerState::UpdatePending(update)
            | SequencerState::CountingDown { update, .. }
            | SequencerState::Restarting(update) => Some(update),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SequencerState::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SequencerState::Idle => "idle",
            SequencerState::UpdatePending(_) => "update_pending",
            SequencerState::CountingDown { .. } => "counting_down",
            SequencerState::Restarting(_) => "restarting",
        }
    }
}

/// Work the runtime must schedule on behalf of the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Tell other plugins an update was found
    AnnounceUpdate {
        required_version: u32,
        local_version: LocalVersion,
    },
    /// Cancel the recurring update check
    StopPolling,
    /// Call `on_countdown_elapsed` after the delay
    ScheduleCountdown(Duration),
    /// Drop the pending countdown timer
    CancelCountdown,
    /// Call `on_terminate` after the delay
    ScheduleTerminate(Duration),
}

pub struct ShutdownSequencer {
    config: Arc<UpdaterConfig>,
    state: SequencerState,
    tracker: NotificationTracker,
    map_loading: bool,
    terminate_issued: bool,
}

impl ShutdownSequencer {
    pub fn new(config: Arc<UpdaterConfig>) -> Self {
        Self {
            config,
            state: SequencerState::Idle,
            tracker: NotificationTracker::new(),
            map_loading: false,
            terminate_issued: false,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn tracker(&self) -> &NotificationTracker {
        &self.tracker
    }

    pub fn is_map_loading(&self) -> bool {
        self.map_loading
    }

    /// Seconds left before kicking starts, never below one. `None` unless
    /// counting down.
    pub fn remaining_seconds(&self) -> Option<u64> {
        match self.state {
            SequencerState::CountingDown { update, countdown } => {
                let elapsed = Instant::now().saturating_duration_since(update.found_at);
                Some(countdown.as_secs().saturating_sub(elapsed.as_secs()).max(1))
            }
            _ => None,
        }
    }

    /// Whether `active_players` out of `capacity` slots is few enough to
    /// restart without a warning period.
    pub fn allows_instant_shutdown(&self, active_players: usize, capacity: u32) -> bool {
        if active_players <= self.config.min_players_instant_shutdown as usize {
            return true;
        }
        capacity > 0
            && (active_players as f32 / capacity as f32)
                < self.config.min_player_percentage_shutdown_allowed
    }

    // ------------------------------------------------------------------------
    // Poll results
    // ------------------------------------------------------------------------

    /// Handles a successful poll, at the driver's safe point.
    pub async fn on_update_found(
        &mut self,
        status: &UpdateStatus,
        context: &dyn ServerContext,
    ) -> Vec<Directive> {
        if status.up_to_date {
            return Vec::new();
        }
        if !self.state.is_idle() {
            debug!(
                "Ignoring update result for build {} while {}",
                status.required_version,
                self.state.name()
            );
            return Vec::new();
        }

        let update = PendingUpdate {
            required_version: status.required_version,
            found_at: Instant::now(),
        };
        self.state = SequencerState::UpdatePending(update);
        info!(
            "New game update released (Build: {}), local version {}",
            update.required_version, status.local_version
        );

        let mut directives = vec![
            Directive::AnnounceUpdate {
                required_version: update.required_version,
                local_version: status.local_version.clone(),
            },
            Directive::StopPolling,
        ];

        if self.map_loading {
            info!("Map is loading, restart planning deferred until the next map starts");
            return directives;
        }

        directives.extend(self.begin_countdown(context).await);
        directives
    }

    /// Applies the population policy and establishes the deadline.
    async fn begin_countdown(&mut self, context: &dyn ServerContext) -> Vec<Directive> {
        let SequencerState::UpdatePending(update) = self.state else {
            return Vec::new();
        };

        let sessions = context.sessions().await;
        let active_players = sessions.iter().filter(|s| s.is_active_player()).count();
        let capacity = context
            .visible_max_players()
            .filter(|&slots| slots > 0)
            .unwrap_or_else(|| context.max_players());

        let instant = self.allows_instant_shutdown(active_players, capacity);
        let countdown = if instant {
            info!(
                "{} of {} slots in use, restarting without a warning period",
                active_players, capacity
            );
            INSTANT_COUNTDOWN
        } else {
            self.config.restart_delay()
        };

        self.state = SequencerState::CountingDown { update, countdown };

        if !instant {
            let remaining = self.remaining_seconds().unwrap_or(1);
            let warned = self
                .warn_humans(context, &sessions, update.required_version, remaining)
                .await;
            info!("Restart scheduled in {}s, {} players warned", remaining, warned);
        }

        let delay = update
            .found_at
            .checked_add(countdown)
            .map_or(countdown, |deadline| {
                deadline.saturating_duration_since(Instant::now())
            })
            .max(INSTANT_COUNTDOWN);
        vec![Directive::ScheduleCountdown(delay)]
    }

    /// Warns every human not yet warned and returns how many notices were
    /// delivered.
    async fn warn_humans(
        &mut self,
        context: &dyn ServerContext,
        sessions: &[SessionInfo],
        required_version: u32,
        remaining: u64,
    ) -> usize {
        let mut warned = 0;
        for session in sessions.iter().filter(|s| s.is_human()) {
            if self.tracker.mark_notified_if_needed(session.id)
                && self
                    .send_notice(context, session.id, required_version, remaining)
                    .await
            {
                warned += 1;
            }
        }
        warned
    }

    /// Prints the restart notice; `false` when the print failed.
    async fn send_notice(
        &self,
        context: &dyn ServerContext,
        session: SessionId,
        required_version: u32,
        remaining: u64,
    ) -> bool {
        let line = update_notice(&self.config.chat_tag_prefix, required_version, remaining);
        match context.print_to_session(session, &line).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not warn session {}: {}", session, e);
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Session events
    // ------------------------------------------------------------------------

    pub fn on_session_connected(&mut self, session: &SessionInfo) {
        if session.is_human() {
            self.tracker.reset(session.id);
        }
    }

    pub fn on_session_disconnected(&mut self, session: SessionId) {
        self.tracker.forget(session);
    }

    /// Warns a session entering the game during the countdown, once.
    pub async fn on_session_spawned(&mut self, session: &SessionInfo, context: &dyn ServerContext) {
        let SequencerState::CountingDown { update, .. } = self.state else {
            return;
        };
        if self.map_loading || !session.is_active_player() {
            return;
        }
        if !self.tracker.mark_notified_if_needed(session.id) {
            return;
        }

        let remaining = self.remaining_seconds().unwrap_or(1);
        if self
            .send_notice(context, session.id, update.required_version, remaining)
            .await
        {
            debug!("Warned session {} about the pending restart", session.id);
        }
    }

    // ------------------------------------------------------------------------
    // Map events
    // ------------------------------------------------------------------------

    pub async fn on_map_end(&mut self, context: &dyn ServerContext) -> Vec<Directive> {
        self.map_loading = true;

        if !self.config.shutdown_on_map_change_if_pending_update {
            return Vec::new();
        }

        match self.state {
            SequencerState::CountingDown { update, .. } | SequencerState::Restarting(update) => {
                info!("Map changing with a restart pending, shutting down now");
                self.state = SequencerState::Restarting(update);
                self.terminate(context, update.required_version).await;
                vec![Directive::CancelCountdown]
            }
            _ => Vec::new(),
        }
    }

    pub async fn on_map_start(&mut self, context: &dyn ServerContext) -> Vec<Directive> {
        self.tracker.clear_all();
        self.map_loading = false;

        if matches!(self.state, SequencerState::UpdatePending(_)) {
            return self.begin_countdown(context).await;
        }
        Vec::new()
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    /// Kicks everyone still on the server and schedules termination.
    pub async fn on_countdown_elapsed(&mut self, context: &dyn ServerContext) -> Vec<Directive> {
        let SequencerState::CountingDown { update, .. } = self.state else {
            debug!("Countdown elapsed while {}, ignoring", self.state.name());
            return Vec::new();
        };

        let sessions = context.sessions().await;
        for session in sessions.iter().filter(|s| s.is_human()) {
            match session.state {
                ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Reconnecting => {
                    let command = kick_command(session.user_id, update.required_version);
                    if let Err(e) = context.execute_command(&command).await {
                        warn!("Failed to kick {}: {}", session.name, e);
                    }
                }
                ConnectionState::Disconnecting => {}
            }
        }

        self.state = SequencerState::Restarting(update);
        vec![Directive::ScheduleTerminate(self.config.shutdown_delay())]
    }

    pub async fn on_terminate(&mut self, context: &dyn ServerContext) {
        if let SequencerState::Restarting(update) = self.state {
            self.terminate(context, update.required_version).await;
        }
    }

    async fn terminate(&mut self, context: &dyn ServerContext, required_version: u32) {
        if self.terminate_issued {
            return;
        }
        self.terminate_issued = true;

        info!(
            "Restarting the server due to the new game update (Build: {})",
            required_version
        );
        if let Err(e) = context.execute_command(TERMINATE_COMMAND).await {
            error!("Failed to terminate the server: {}", e);
        }
    }
}
