//! Authoritative session engine.
//!
//! Every mutation of a session, whether it comes from a player or from one of
//! the race timers, goes through [`SessionRegistry::with_session`]. Inside that
//! exclusive section the engine applies the rule engine, publishes the
//! resulting events and queues history records, so subscribers see events in
//! exactly the order transitions were applied. Nothing inside the section
//! waits on I/O: publishing and queueing are plain channel sends.

use crate::broadcast::{EventBus, EventReceiver};
use crate::config::EngineConfig;
use crate::error::SessionError;
use crate::registry::SessionRegistry;
use crate::sink::{HistoryRecord, SideChannel, SnapshotRecord};
use crate::utils::get_timestamp;
use log::{debug, info, warn};
use shared::{
    Action, Difficulty, GameEvent, GameVariant, PlayerId, RaceSettings, SessionId, SessionState,
    TimerAction,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub struct GameEngine {
    registry: SessionRegistry,
    bus: EventBus,
    sinks: SideChannel,
    config: EngineConfig,
}

impl GameEngine {
    pub fn new(config: EngineConfig, sinks: SideChannel) -> Arc<Self> {
        Arc::new(Self {
            registry: SessionRegistry::new(),
            bus: EventBus::new(),
            sinks,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sinks(&self) -> &SideChannel {
        &self.sinks
    }

    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    /// Subscribes to the events of one session.
    pub fn subscribe(&self, session_id: SessionId) -> (usize, EventReceiver) {
        self.bus.subscribe(session_id)
    }

    pub fn unsubscribe(&self, session_id: SessionId, subscriber_id: usize) {
        self.bus.unsubscribe(session_id, subscriber_id);
    }

    /// Starts a session once the lobby roster is final.
    ///
    /// `difficulty` only matters for typing races and falls back to the
    /// configured default.
    pub async fn create_session(
        &self,
        session_id: SessionId,
        variant: GameVariant,
        players: Vec<PlayerId>,
        difficulty: Option<Difficulty>,
    ) -> Result<SessionState, SessionError> {
        let settings = RaceSettings {
            difficulty: difficulty.unwrap_or(self.config.race.difficulty),
            max_duration_secs: self.config.race.max_duration_secs,
        };
        let now = get_timestamp();
        self.registry
            .create(session_id, variant, players, &settings, now, |state| {
                self.emit(session_id, &[GameEvent::Initialized { state: state.clone() }], now);
            })
            .await
    }

    /// Applies a player action and returns the events it produced.
    pub async fn submit(
        self: &Arc<Self>,
        session_id: SessionId,
        player_id: PlayerId,
        action: Action,
    ) -> Result<Vec<GameEvent>, SessionError> {
        let result = self
            .transition(session_id, |state, now| Ok(state.apply(player_id, action, now)?))
            .await;
        if let Err(e) = &result {
            debug!("Rejected {:?} from {} in {}: {}", action, player_id, session_id, e);
        }
        result
    }

    /// Ends a two-player game with the other participant as the winner.
    pub async fn forfeit(
        self: &Arc<Self>,
        session_id: SessionId,
        player_id: PlayerId,
    ) -> Result<Vec<GameEvent>, SessionError> {
        self.submit(session_id, player_id, Action::Forfeit).await
    }

    /// Checks whether `action` would currently be accepted, without applying it.
    pub async fn check_action(
        &self,
        session_id: SessionId,
        player_id: PlayerId,
        action: &Action,
    ) -> Result<(), SessionError> {
        let state = self.registry.get(session_id).await?;
        Ok(state.validate(player_id, action)?)
    }

    /// Kicks off a typing race: a countdown, then the start, then the
    /// max-duration timer. Returns once the start has been reserved.
    pub async fn start_race(self: &Arc<Self>, session_id: SessionId) -> Result<(), SessionError> {
        self.registry
            .with_session(session_id, |state| Ok(state.arm_race_start()?))
            .await?;
        info!("Race {} counting down", session_id);

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_countdown(session_id).await;
        });
        Ok(())
    }

    /// Point-in-time copy of the session.
    pub async fn get_state(&self, session_id: SessionId) -> Result<SessionState, SessionError> {
        self.registry.get(session_id).await
    }

    async fn run_countdown(self: Arc<Self>, session_id: SessionId) {
        for n in (1..=self.config.countdown_from).rev() {
            self.bus.publish(session_id, &[GameEvent::Countdown(n)]);
            sleep(self.config.countdown_interval).await;
        }

        let events = self.fire_timer(session_id, TimerAction::BeginRace).await;
        let max_duration_secs = events.iter().find_map(|event| match event {
            GameEvent::RaceStarted {
                max_duration_secs, ..
            } => Some(*max_duration_secs),
            _ => None,
        });

        if let Some(secs) = max_duration_secs {
            info!("Race {} started, ends in at most {}s", session_id, secs);
            sleep(Duration::from_secs(secs)).await;
            self.fire_timer(session_id, TimerAction::RaceTimeout).await;
        }
    }

    /// Runs a timer transition. Timers have no caller to report to, so
    /// failures are logged and broadcast to the session instead.
    async fn fire_timer(self: &Arc<Self>, session_id: SessionId, timer: TimerAction) -> Vec<GameEvent> {
        match self
            .transition(session_id, |state, now| Ok(state.apply_timer(timer, now)?))
            .await
        {
            Ok(events) => {
                if events.is_empty() {
                    debug!("{:?} for {} had nothing to do", timer, session_id);
                }
                events
            }
            Err(SessionError::NotFound(_)) => {
                debug!("{:?} fired for evicted session {}", timer, session_id);
                Vec::new()
            }
            Err(e) => {
                warn!("{:?} failed for session {}: {}", timer, session_id, e);
                self.bus
                    .publish(session_id, &[GameEvent::GameError(e.to_string())]);
                Vec::new()
            }
        }
    }

    /// The single mutation path. `f` sees the state under exclusive access;
    /// if it succeeds its events are published and logged before the lock is
    /// released, and a session that just became terminal is snapshotted and
    /// scheduled for eviction.
    async fn transition<F>(
        self: &Arc<Self>,
        session_id: SessionId,
        f: F,
    ) -> Result<Vec<GameEvent>, SessionError>
    where
        F: FnOnce(&mut SessionState, u64) -> Result<Vec<GameEvent>, SessionError>,
    {
        let (events, finished) = self
            .registry
            .with_session(session_id, |state| {
                let now = get_timestamp();
                let was_terminal = state.is_terminal();
                let events = f(state, now)?;

                self.emit(session_id, &events, now);

                let finished = !was_terminal && state.is_terminal();
                if finished {
                    self.sinks.snapshot(SnapshotRecord {
                        session_id,
                        finished_at: now,
                        state: state.clone(),
                    });
                }
                Ok((events, finished.then(|| state.variant())))
            })
            .await?;

        if let Some(variant) = finished {
            let grace = self.config.grace_period(variant);
            info!(
                "Session {} finished, evicting in {}s",
                session_id,
                grace.as_secs()
            );
            self.schedule_eviction(session_id, grace);
        }

        Ok(events)
    }

    fn emit(&self, session_id: SessionId, events: &[GameEvent], now: u64) {
        self.bus.publish(session_id, events);
        for event in events {
            if let Some(record) = HistoryRecord::from_event(session_id, event, now) {
                self.sinks.record(record);
            }
        }
    }

    fn schedule_eviction(self: &Arc<Self>, session_id: SessionId, grace: Duration) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            sleep(grace).await;
            if engine.registry.evict(session_id).await {
                engine.bus.close_session(session_id);
            }
        });
    }
}
