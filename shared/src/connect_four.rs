//! Connect-four rules on a 6x7 board with gravity.
//!
//! A move names a column only; the disc lands on the lowest empty row. Row 0
//! is the top of the board, so a column is full once its row 0 is taken.

use crate::event::GameEvent;
use crate::{opponent_of, Coord, PlayerId, RuleError};
use serde::{Deserialize, Serialize};

pub const ROWS: usize = 6;
pub const COLS: usize = 7;
pub const CONNECT: usize = 4;

/// Scan directions as (row step, column step): horizontal, vertical and the
/// two diagonals. Each is also walked in the opposite sense.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disc {
    One,
    Two,
}

impl Disc {
    pub fn number(self) -> u8 {
        match self {
            Disc::One => 1,
            Disc::Two => 2,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Disc::One => "red",
            Disc::Two => "yellow",
        }
    }
}

pub type Board = [[Option<Disc>; COLS]; ROWS];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectFourState {
    pub players: [PlayerId; 2],
    pub board: Board,
    pub current_turn: PlayerId,
    pub winner: Option<PlayerId>,
    pub is_draw: bool,
    pub is_over: bool,
    pub winning_line: Option<Vec<Coord>>,
    pub total_moves: u32,
    pub last_move_at: u64,
}

impl ConnectFourState {
    pub fn new(player1: PlayerId, player2: PlayerId, now: u64) -> Self {
        Self {
            players: [player1, player2],
            board: [[None; COLS]; ROWS],
            current_turn: player1,
            winner: None,
            is_draw: false,
            is_over: false,
            winning_line: None,
            total_moves: 0,
            last_move_at: now,
        }
    }

    pub fn disc_of(&self, player_id: PlayerId) -> Option<Disc> {
        if player_id == self.players[0] {
            Some(Disc::One)
        } else if player_id == self.players[1] {
            Some(Disc::Two)
        } else {
            None
        }
    }

    /// Row a disc dropped into `column` would land on.
    pub fn landing_row(&self, column: usize) -> Option<usize> {
        if column >= COLS {
            return None;
        }
        (0..ROWS).rev().find(|&row| self.board[row][column].is_none())
    }

    pub fn check_move(&self, player_id: PlayerId, column: usize) -> Result<(), RuleError> {
        if self.is_over {
            return Err(RuleError::AlreadyTerminal);
        }
        if self.current_turn != player_id {
            return Err(RuleError::NotYourTurn);
        }
        if column >= COLS {
            return Err(RuleError::NoSuchColumn(column));
        }
        if self.board[0][column].is_some() {
            return Err(RuleError::ColumnFull(column));
        }
        Ok(())
    }

    pub fn is_valid_move(&self, player_id: PlayerId, column: usize) -> bool {
        self.check_move(player_id, column).is_ok()
    }

    pub fn drop_piece(
        &mut self,
        player_id: PlayerId,
        column: usize,
        now: u64,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.check_move(player_id, column)?;
        let disc = self.disc_of(player_id).ok_or(RuleError::UnknownPlayer)?;
        let row = self
            .landing_row(column)
            .ok_or(RuleError::ColumnFull(column))?;

        self.board[row][column] = Some(disc);
        self.total_moves += 1;
        self.last_move_at = now;

        if let Some(line) = find_winning_line(&self.board, disc, row, column) {
            self.winner = Some(player_id);
            self.is_over = true;
            self.winning_line = Some(line);
        } else if is_top_row_full(&self.board) {
            self.is_draw = true;
            self.is_over = true;
        } else {
            self.current_turn = opponent_of(&self.players, player_id);
        }

        let mut events = vec![GameEvent::PieceDropped {
            player_id,
            row,
            column,
            disc,
            board: self.clone(),
        }];
        if self.is_over {
            events.push(self.game_over(player_id));
        }
        Ok(events)
    }

    pub fn forfeit(&mut self, player_id: PlayerId, now: u64) -> Result<Vec<GameEvent>, RuleError> {
        if self.is_over {
            return Err(RuleError::AlreadyTerminal);
        }
        if self.disc_of(player_id).is_none() {
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
            winning_line: self.winning_line.clone(),
            total_moves: self.total_moves,
        }
    }
}

/// Looks for a run of at least four `disc` through (`row`, `col`).
///
/// The returned line is the contiguous run actually found, ordered from one
/// end to the other, and always contains the starting cell.
pub fn find_winning_line(board: &Board, disc: Disc, row: usize, col: usize) -> Option<Vec<Coord>> {
    for (dr, dc) in DIRECTIONS {
        let backward = walk(board, disc, row, col, -dr, -dc);
        let forward = walk(board, disc, row, col, dr, dc);

        if backward.len() + 1 + forward.len() >= CONNECT {
            let mut line: Vec<Coord> = backward.into_iter().rev().collect();
            line.push(Coord::new(row, col));
            line.extend(forward);
            return Some(line);
        }
    }
    None
}

// Cells matching `disc` stepping away from (row, col), nearest first.
fn walk(board: &Board, disc: Disc, row: usize, col: usize, dr: isize, dc: isize) -> Vec<Coord> {
    let mut cells = Vec::new();
    let mut r = row as isize + dr;
    let mut c = col as isize + dc;

    while r >= 0 && r < ROWS as isize && c >= 0 && c < COLS as isize {
        if board[r as usize][c as usize] != Some(disc) {
            break;
        }
        cells.push(Coord::new(r as usize, c as usize));
        r += dr;
        c += dc;
    }
    cells
}

pub fn is_top_row_full(board: &Board) -> bool {
    board[0].iter().all(Option::is_some)
}
