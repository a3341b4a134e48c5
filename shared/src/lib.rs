//! Rules, state and wire types shared by the arcade server and its clients.
//!
//! Everything in this crate is pure: no sockets, no clocks, no locks. Time is
//! passed in as millisecond timestamps and randomness through a caller-owned
//! `Rng`, so the same transition always produces the same result.

pub mod connect_four;
pub mod event;
pub mod protocol;
pub mod session;
pub mod tic_tac_toe;
pub mod typing_race;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub use connect_four::{ConnectFourState, Disc};
pub use event::GameEvent;
pub use protocol::{ClientPacket, Rejection, RejectionKind, ServerPacket};
pub use session::{Action, GameState, GameVariant, RaceSettings, SessionState, TimerAction};
pub use tic_tac_toe::{Mark, TicTacToeState};
pub use typing_race::{Difficulty, PlayerProgress, RacePhase, TypingRaceState};

pub type SessionId = Uuid;
pub type PlayerId = Uuid;

/// A board cell, row 0 being the top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Coarse classification of a rejected action, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidMove,
    WrongPhase,
    AlreadyTerminal,
    InvalidRoster,
}

/// A rule violation. Rejected actions never mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RuleError {
    #[error("the game is already over")]
    AlreadyTerminal,
    #[error("it is not this player's turn")]
    NotYourTurn,
    #[error("position ({row}, {col}) is off the board")]
    OutOfBounds { row: usize, col: usize },
    #[error("column {0} does not exist")]
    NoSuchColumn(usize),
    #[error("cell ({row}, {col}) is already occupied")]
    CellOccupied { row: usize, col: usize },
    #[error("column {0} is full")]
    ColumnFull(usize),
    #[error("player is not part of this game")]
    UnknownPlayer,
    #[error("action is not supported by {0}")]
    UnsupportedAction(GameVariant),
    #[error("race has not started yet")]
    RaceNotStarted,
    #[error("race has already started")]
    RaceAlreadyStarted,
    #[error("player has already finished the race")]
    AlreadyFinished,
    #[error("{variant} needs {} players, got {actual}", .variant.player_requirement())]
    PlayerCount { variant: GameVariant, actual: usize },
    #[error("player {0} appears more than once in the roster")]
    DuplicatePlayer(PlayerId),
}

impl RuleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuleError::AlreadyTerminal => ErrorKind::AlreadyTerminal,
            RuleError::RaceNotStarted
            | RuleError::RaceAlreadyStarted
            | RuleError::AlreadyFinished => ErrorKind::WrongPhase,
            RuleError::PlayerCount { .. } | RuleError::DuplicatePlayer(_) => {
                ErrorKind::InvalidRoster
            }
            _ => ErrorKind::InvalidMove,
        }
    }
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameVariant::TicTacToe => "tic-tac-toe",
            GameVariant::ConnectFour => "connect-four",
            GameVariant::TypingRace => "typing race",
        };
        f.write_str(name)
    }
}

/// Returns the other participant of a two-player game.
pub(crate) fn opponent_of(players: &[PlayerId; 2], player_id: PlayerId) -> PlayerId {
    if player_id == players[0] {
        players[1]
    } else {
        players[0]
    }
}
