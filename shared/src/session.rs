//! The polymorphic session state and the single dispatch point that routes
//! player actions and timer firings to the matching rule engine.

use crate::connect_four::ConnectFourState;
use crate::event::GameEvent;
use crate::tic_tac_toe::TicTacToeState;
use crate::typing_race::{Difficulty, TypingRaceState, DEFAULT_MAX_DURATION_SECS};
use crate::{PlayerId, RuleError, SessionId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameVariant {
    TicTacToe,
    ConnectFour,
    TypingRace,
}

impl GameVariant {
    pub fn accepts_player_count(self, count: usize) -> bool {
        match self {
            GameVariant::TicTacToe | GameVariant::ConnectFour => count == 2,
            GameVariant::TypingRace => count >= 2,
        }
    }

    pub fn player_requirement(self) -> &'static str {
        match self {
            GameVariant::TicTacToe | GameVariant::ConnectFour => "exactly 2",
            GameVariant::TypingRace => "at least 2",
        }
    }
}

/// Parameters used when a typing race is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceSettings {
    pub difficulty: Difficulty,
    pub max_duration_secs: u64,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
        }
    }
}

/// An action submitted by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    PlaceMark { row: usize, col: usize },
    DropPiece { column: usize },
    UpdateProgress { characters_typed: u32, error_count: u32 },
    Forfeit,
}

/// A transition driven by a timer rather than by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerAction {
    BeginRace,
    RaceTimeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameState {
    TicTacToe(TicTacToeState),
    ConnectFour(ConnectFourState),
    TypingRace(TypingRaceState),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub players: Vec<PlayerId>,
    pub created_at: u64,
    pub last_activity: u64,
    pub game: GameState,
}

impl SessionState {
    /// Builds the initial state for `variant`, validating the roster.
    pub fn new<R: Rng + ?Sized>(
        session_id: SessionId,
        variant: GameVariant,
        players: Vec<PlayerId>,
        settings: &RaceSettings,
        rng: &mut R,
        now: u64,
    ) -> Result<Self, RuleError> {
        if !variant.accepts_player_count(players.len()) {
            return Err(RuleError::PlayerCount {
                variant,
                actual: players.len(),
            });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = players.iter().find(|id| !seen.insert(**id)) {
            return Err(RuleError::DuplicatePlayer(*dup));
        }

        let game = match variant {
            GameVariant::TicTacToe => {
                GameState::TicTacToe(TicTacToeState::new(players[0], players[1], now))
            }
            GameVariant::ConnectFour => {
                GameState::ConnectFour(ConnectFourState::new(players[0], players[1], now))
            }
            GameVariant::TypingRace => GameState::TypingRace(TypingRaceState::new(
                &players,
                settings.difficulty.pick_text(rng),
                settings.max_duration_secs,
            )),
        };

        Ok(Self {
            session_id,
            players,
            created_at: now,
            last_activity: now,
            game,
        })
    }

    pub fn variant(&self) -> GameVariant {
        match self.game {
            GameState::TicTacToe(_) => GameVariant::TicTacToe,
            GameState::ConnectFour(_) => GameVariant::ConnectFour,
            GameState::TypingRace(_) => GameVariant::TypingRace,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match &self.game {
            GameState::TicTacToe(g) => g.is_over,
            GameState::ConnectFour(g) => g.is_over,
            GameState::TypingRace(g) => g.is_finished(),
        }
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match &self.game {
            GameState::TicTacToe(g) => g.winner,
            GameState::ConnectFour(g) => g.winner,
            GameState::TypingRace(g) => g.winner(),
        }
    }

    pub fn is_draw(&self) -> bool {
        match &self.game {
            GameState::TicTacToe(g) => g.is_draw,
            GameState::ConnectFour(g) => g.is_draw,
            GameState::TypingRace(_) => false,
        }
    }

    pub fn total_moves(&self) -> u32 {
        match &self.game {
            GameState::TicTacToe(g) => g.total_moves,
            GameState::ConnectFour(g) => g.total_moves,
            GameState::TypingRace(g) => g.total_updates,
        }
    }

    /// Whose turn it is in the two-player games.
    pub fn current_turn(&self) -> Option<PlayerId> {
        match &self.game {
            GameState::TicTacToe(g) if !g.is_over => Some(g.current_turn),
            GameState::ConnectFour(g) if !g.is_over => Some(g.current_turn),
            _ => None,
        }
    }

    /// Checks an action without applying it, by dry-running it on a copy.
    pub fn validate(&self, player_id: PlayerId, action: &Action) -> Result<(), RuleError> {
        self.clone()
            .apply(player_id, *action, self.last_activity)
            .map(|_| ())
    }

    pub fn apply(
        &mut self,
        player_id: PlayerId,
        action: Action,
        now: u64,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let variant = self.variant();
        let events = match (&mut self.game, action) {
            (GameState::TicTacToe(g), Action::PlaceMark { row, col }) => {
                g.apply_move(player_id, row, col, now)?
            }
            (GameState::ConnectFour(g), Action::DropPiece { column }) => {
                g.drop_piece(player_id, column, now)?
            }
            (
                GameState::TypingRace(g),
                Action::UpdateProgress {
                    characters_typed,
                    error_count,
                },
            ) => g.update_progress(player_id, characters_typed, error_count, now)?,
            (GameState::TicTacToe(g), Action::Forfeit) => g.forfeit(player_id, now)?,
            (GameState::ConnectFour(g), Action::Forfeit) => g.forfeit(player_id, now)?,
            _ => return Err(RuleError::UnsupportedAction(variant)),
        };
        self.last_activity = now;
        Ok(events)
    }

    /// Reserves the race start ahead of its countdown.
    pub fn arm_race_start(&mut self) -> Result<(), RuleError> {
        let variant = self.variant();
        match &mut self.game {
            GameState::TypingRace(g) => g.arm_countdown(),
            _ => Err(RuleError::UnsupportedAction(variant)),
        }
    }

    /// Applies a timer firing. Firings that no longer apply (the race already
    /// ended, for instance) produce no events and change nothing.
    pub fn apply_timer(&mut self, timer: TimerAction, now: u64) -> Result<Vec<GameEvent>, RuleError> {
        let variant = self.variant();
        let GameState::TypingRace(race) = &mut self.game else {
            return Err(RuleError::UnsupportedAction(variant));
        };
        let events = match timer {
            TimerAction::BeginRace => race.start(now)?,
            TimerAction::RaceTimeout => race.expire(now),
        };
        if !events.is_empty() {
            self.last_activity = now;
        }
        Ok(events)
    }
}
