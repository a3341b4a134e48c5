//! Events produced by session transitions and fanned out to every
//! participant of the session.

use crate::connect_four::{ConnectFourState, Disc};
use crate::session::SessionState;
use crate::tic_tac_toe::{Mark, TicTacToeState};
use crate::typing_race::PlayerProgress;
use crate::{Coord, PlayerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Initialized {
        state: SessionState,
    },
    MoveApplied {
        player_id: PlayerId,
        row: usize,
        col: usize,
        mark: Mark,
        board: TicTacToeState,
    },
    PieceDropped {
        player_id: PlayerId,
        row: usize,
        column: usize,
        disc: Disc,
        board: ConnectFourState,
    },
    GameOver {
        winner: Option<PlayerId>,
        /// Player whose move or forfeit ended the game.
        ended_by: PlayerId,
        is_draw: bool,
        winning_line: Option<Vec<Coord>>,
        total_moves: u32,
    },
    Countdown(u32),
    RaceStarted {
        started_at: u64,
        text: String,
        max_duration_secs: u64,
    },
    ProgressUpdated {
        progress: PlayerProgress,
    },
    PlayerFinished {
        progress: PlayerProgress,
    },
    RaceTimeout,
    RaceEnded {
        results: Vec<PlayerProgress>,
        duration_ms: u64,
    },
    PlayerForfeited {
        forfeiter: PlayerId,
        winner: PlayerId,
    },
    GameError(String),
}

impl GameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::Initialized { .. } => "Initialized",
            GameEvent::MoveApplied { .. } => "MoveApplied",
            GameEvent::PieceDropped { .. } => "PieceDropped",
            GameEvent::GameOver { .. } => "GameOver",
            GameEvent::Countdown(_) => "Countdown",
            GameEvent::RaceStarted { .. } => "RaceStarted",
            GameEvent::ProgressUpdated { .. } => "ProgressUpdated",
            GameEvent::PlayerFinished { .. } => "PlayerFinished",
            GameEvent::RaceTimeout => "RaceTimeout",
            GameEvent::RaceEnded { .. } => "RaceEnded",
            GameEvent::PlayerForfeited { .. } => "PlayerForfeited",
            GameEvent::GameError(_) => "GameError",
        }
    }

    /// Action type recorded in the history log, `None` for events that are
    /// not state transitions of their own.
    pub fn history_action(&self) -> Option<&'static str> {
        match self {
            GameEvent::Initialized { .. } => Some("GameInitialized"),
            GameEvent::MoveApplied { .. } => Some("MakeMove"),
            GameEvent::PieceDropped { .. } => Some("DropPiece"),
            GameEvent::GameOver { .. } => Some("GameEnded"),
            GameEvent::RaceStarted { .. } => Some("RaceStarted"),
            GameEvent::ProgressUpdated { .. } => Some("ProgressUpdate"),
            GameEvent::PlayerFinished { .. } => Some("PlayerFinished"),
            GameEvent::RaceEnded { .. } => Some("RaceEnded"),
            GameEvent::PlayerForfeited { .. } => Some("PlayerForfeited"),
            GameEvent::Countdown(_) | GameEvent::RaceTimeout | GameEvent::GameError(_) => None,
        }
    }

    /// Player the event is attributed to, if any.
    pub fn actor(&self) -> Option<PlayerId> {
        match self {
            GameEvent::MoveApplied { player_id, .. } | GameEvent::PieceDropped { player_id, .. } => {
                Some(*player_id)
            }
            GameEvent::ProgressUpdated { progress } | GameEvent::PlayerFinished { progress } => {
                Some(progress.player_id)
            }
            GameEvent::PlayerForfeited { forfeiter, .. } => Some(*forfeiter),
            GameEvent::GameOver {
                winner, ended_by, ..
            } => Some(winner.unwrap_or(*ended_by)),
            GameEvent::Initialized { state } => state.players.first().copied(),
            _ => None,
        }
    }

    /// True for the events that close a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameEvent::GameOver { .. } | GameEvent::RaceEnded { .. })
    }
}
