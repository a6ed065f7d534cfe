//! Board model and the three-in-a-row rule.
//!
//! On the wire a board is a `[[u8; 3]; 3]` grid where `0` is empty and `1`/`2`
//! are the marks of seat A/B. Seats themselves travel as `1`/`2`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RelayError;

pub const BOARD_SIZE: usize = 3;

/// Number of cells; a game with this many moves is over.
pub const BOARD_CELLS: u8 = 9;

/// Every winning line as `(row, col)` triples: rows, columns, diagonals.
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

/// One of the two seats in a room. Seat A always opens a fresh game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Seat {
    A,
    B,
}

impl Seat {
    pub const ALL: [Seat; 2] = [Seat::A, Seat::B];

    /// Wire number of the seat (also the value of its mark on the board).
    pub fn number(self) -> u8 {
        match self {
            Seat::A => 1,
            Seat::B => 2,
        }
    }

    pub fn other(self) -> Seat {
        match self {
            Seat::A => Seat::B,
            Seat::B => Seat::A,
        }
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> Self {
        seat.number()
    }
}

impl TryFrom<u8> for Seat {
    type Error = RelayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Seat::A),
            2 => Ok(Seat::B),
            other => Err(RelayError::InvalidSeat(other)),
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::A => write!(f, "A"),
            Seat::B => write!(f, "B"),
        }
    }
}

/// A 3×3 grid of marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "[[u8; 3]; 3]", into = "[[u8; 3]; 3]")]
pub struct Board {
    cells: [[Option<Seat>; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Seat> {
        self.cells[row][col]
    }

    /// Return a copy of the board with `seat`'s mark placed at `(row, col)`.
    pub fn with_mark(mut self, row: usize, col: usize, seat: Seat) -> Self {
        self.cells[row][col] = Some(seat);
        self
    }

    pub fn filled_cells(&self) -> u8 {
        self.cells.iter().flatten().filter(|cell| cell.is_some()).count() as u8
    }

    /// True iff `seat` holds a full row, column or diagonal.
    pub fn has_line(&self, seat: Seat) -> bool {
        LINES.iter().any(|line| {
            line.iter()
                .all(|&(row, col)| self.cells[row][col] == Some(seat))
        })
    }

    /// The winning seat, checking A before B. Only an unreachable board can
    /// hold lines for both; A wins that tie.
    pub fn winner(&self) -> Option<Seat> {
        Seat::ALL.into_iter().find(|&seat| self.has_line(seat))
    }
}

impl From<Board> for [[u8; 3]; 3] {
    fn from(board: Board) -> Self {
        board
            .cells
            .map(|row| row.map(|cell| cell.map(Seat::number).unwrap_or(0)))
    }
}

impl TryFrom<[[u8; 3]; 3]> for Board {
    type Error = RelayError;

    fn try_from(raw: [[u8; 3]; 3]) -> Result<Self, Self::Error> {
        let mut board = Board::new();
        for (row, values) in raw.iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                board.cells[row][col] = match value {
                    0 => None,
                    _ => Some(
                        Seat::try_from(value)
                            .map_err(|_| RelayError::InvalidCell { row, col, value })?,
                    ),
                };
            }
        }
        Ok(board)
    }
}

/// Terminal status of a room's game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub winner: Option<Seat>,
    pub game_over: bool,
}

impl Outcome {
    /// Status of an arbitrary position, used for snapshots.
    pub fn evaluate(board: &Board, moves: u8) -> Self {
        let winner = board.winner();
        Self {
            winner,
            game_over: winner.is_some() || moves >= BOARD_CELLS,
        }
    }

    /// Status right after `mover` played. Only the mover can have completed a line.
    pub fn after_move(board: &Board, mover: Seat, moves: u8) -> Self {
        let winner = board.has_line(mover).then_some(mover);
        Self {
            winner,
            game_over: winner.is_some() || moves >= BOARD_CELLS,
        }
    }
}

/// Serde adapter for `Option<Seat>` where `0` means "no winner" (draw or still playing).
pub mod winner_code {
    use super::Seat;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(winner: &Option<Seat>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(winner.map(Seat::number).unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Seat>, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(None),
            value => Seat::try_from(value).map(Some).map_err(D::Error::custom),
        }
    }
}
