//! Moves and rule-level move errors.

use crate::board::{Color, Position};
use serde::{Deserialize, Serialize};

/// A move: a color placing a stone at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{color} -> {position}")]
pub struct Move {
    /// The color making the move.
    pub color: Color,
    /// Where the stone goes.
    pub position: Position,
}

impl Move {
    /// Creates a new move.
    pub fn new(color: Color, position: Position) -> Self {
        Self { color, position }
    }
}

/// Error that can occur when applying a move under the board rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// The target cell already holds a stone.
    #[display("Cell {} is already occupied", _0)]
    Occupied(Position),

    /// The target lies outside the board.
    #[display("Position {} is off the board", _0)]
    OutOfBounds(Position),

    /// The game has already been won.
    #[display("Game is already over")]
    GameOver,

    /// It is the other color's turn.
    #[display("It's not {}'s turn", _0)]
    WrongColor(Color),
}

impl std::error::Error for MoveError {}
