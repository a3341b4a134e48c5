//! Tic-tac-toe rules on a 3x3 grid.
//!
//! The first listed player plays `X` and moves first. A move is legal only for
//! the player whose turn it is, inside the grid, on an empty cell, while the
//! game is still running.

use crate::event::GameEvent;
use crate::{opponent_of, Coord, PlayerId, RuleError};
use serde::{Deserialize, Serialize};

pub const SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

/// The eight lines that win the game: rows, columns, then both diagonals.
const LINES: [[(usize, usize); 3]; 8] = [
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicTacToeState {
    pub players: [PlayerId; 2],
    pub board: [[Option<Mark>; SIZE]; SIZE],
    pub current_turn: PlayerId,
    pub winner: Option<PlayerId>,
    pub is_draw: bool,
    pub is_over: bool,
    pub winning_line: Option<[Coord; 3]>,
    pub total_moves: u32,
    pub last_move_at: u64,
}

impl TicTacToeState {
    pub fn new(player1: PlayerId, player2: PlayerId, now: u64) -> Self {
        Self {
            players: [player1, player2],
            board: [[None; SIZE]; SIZE],
            current_turn: player1,
            winner: None,
            is_draw: false,
            is_over: false,
            winning_line: None,
            total_moves: 0,
            last_move_at: now,
        }
    }

    /// Mark assigned to a participant, `None` for outsiders.
    pub fn mark_of(&self, player_id: PlayerId) -> Option<Mark> {
        if player_id == self.players[0] {
            Some(Mark::X)
        } else if player_id == self.players[1] {
            Some(Mark::O)
        } else {
            None
        }
    }

    pub fn check_move(&self, player_id: PlayerId, row: usize, col: usize) -> Result<(), RuleError> {
        if self.is_over {
            return Err(RuleError::AlreadyTerminal);
        }
        if self.current_turn != player_id {
            return Err(RuleError::NotYourTurn);
        }
        if row >= SIZE || col >= SIZE {
            return Err(RuleError::OutOfBounds { row, col });
        }
        if self.board[row][col].is_some() {
            return Err(RuleError::CellOccupied { row, col });
        }
        Ok(())
    }

    pub fn is_valid_move(&self, player_id: PlayerId, row: usize, col: usize) -> bool {
        self.check_move(player_id, row, col).is_ok()
    }

    /// Places the mover's mark and resolves win, draw or turn hand-over.
    pub fn apply_move(
        &mut self,
        player_id: PlayerId,
        row: usize,
        col: usize,
        now: u64,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.check_move(player_id, row, col)?;
        let mark = self.mark_of(player_id).ok_or(RuleError::UnknownPlayer)?;

        self.board[row][col] = Some(mark);
        self.total_moves += 1;
        self.last_move_at = now;

        if let Some(line) = find_winning_line(&self.board, mark) {
            self.winner = Some(player_id);
            self.is_over = true;
            self.winning_line = Some(line);
        } else if is_board_full(&self.board) {
            self.is_draw = true;
            self.is_over = true;
        } else {
            self.current_turn = opponent_of(&self.players, player_id);
        }

        let mut events = vec![GameEvent::MoveApplied {
            player_id,
            row,
            col,
            mark,
            board: self.clone(),
        }];
        if self.is_over {
            events.push(self.game_over(player_id));
        }
        Ok(events)
    }

    /// Ends the game in favour of the opponent of `player_id`.
    pub fn forfeit(&mut self, player_id: PlayerId, now: u64) -> Result<Vec<GameEvent>, RuleError> {
        if self.is_over {
            return Err(RuleError::AlreadyTerminal);
        }
        if self.mark_of(player_id).is_none() {
            return Err(RuleError::UnknownPlayer);
        }
        let winner = opponent_of(&self.players, player_id);
        self.winner = Some(winner);
        self.is_over = true;
        self.last_move_at = now;

        Ok(vec![
            GameEvent::PlayerForfeited {
                forfeiter: player_id,
                winner,
            },
            self.game_over(player_id),
        ])
    }

    fn game_over(&self, ended_by: PlayerId) -> GameEvent {
        GameEvent::GameOver {
            winner: self.winner,
            ended_by,
            is_draw: self.is_draw,
            winning_line: self.winning_line.map(|line| line.to_vec()),
            total_moves: self.total_moves,
        }
    }
}

pub fn find_winning_line(board: &[[Option<Mark>; SIZE]; SIZE], mark: Mark) -> Option<[Coord; 3]> {
    LINES
        .iter()
        .find(|line| line.iter().all(|&(r, c)| board[r][c] == Some(mark)))
        .map(|line| line.map(|(r, c)| Coord::new(r, c)))
}

pub fn is_board_full(board: &[[Option<Mark>; SIZE]; SIZE]) -> bool {
    board.iter().flatten().all(Option::is_some)
}
