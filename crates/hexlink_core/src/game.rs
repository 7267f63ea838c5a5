//! Same-device game engine.
//!
//! Both colors play from one device; nothing is persisted. The engine
//! shares placement and win detection with the online authority.

use crate::action::{Move, MoveError};
use crate::board::{Board, Color, Position};
use crate::rules::check_win;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Outcome of a successful placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// The game continues with the returned color to move.
    Continue(Color),
    /// The move completed a winning chain.
    Won {
        /// The winning color.
        winner: Color,
        /// The connecting chain, start edge to goal edge.
        path: Vec<Position>,
    },
}

/// Places `color` at `pos` if the cell is on the board and empty, then
/// checks for a win.
///
/// Shared by the local engine and the online match record.
pub fn place_stone(board: &mut Board, color: Color, pos: Position) -> Result<Option<Vec<Position>>, MoveError> {
    if !pos.in_bounds() {
        return Err(MoveError::OutOfBounds(pos));
    }
    if !board.is_empty(pos) {
        return Err(MoveError::Occupied(pos));
    }
    board.set(pos, color);
    Ok(check_win(board, color))
}

/// Local two-player game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGame {
    board: Board,
    current: Color,
    winner: Option<Color>,
    winning_path: Vec<Position>,
    history: Vec<Move>,
}

impl LocalGame {
    /// Creates a fresh game with Blue to move.
    #[instrument]
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            current: Color::FIRST,
            winner: None,
            winning_path: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the color to move. Frozen at the winner once won.
    pub fn current(&self) -> Color {
        self.current
    }

    /// Returns the winner, if any.
    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    /// Returns the winning chain, empty until won.
    pub fn winning_path(&self) -> &[Position] {
        &self.winning_path
    }

    /// Returns moves played so far.
    pub fn history(&self) -> &[Move] {
        &self.history
    }

    /// Whether the game is over.
    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Plays the current color at `pos`.
    #[instrument(skip(self), fields(color = %self.current))]
    pub fn play(&mut self, pos: Position) -> Result<Placement, MoveError> {
        if self.winner.is_some() {
            return Err(MoveError::GameOver);
        }

        let color = self.current;
        let won = place_stone(&mut self.board, color, pos)?;
        self.history.push(Move::new(color, pos));

        match won {
            Some(path) => {
                info!(%color, length = path.len(), "Local game won");
                self.winner = Some(color);
                self.winning_path = path.clone();
                Ok(Placement::Won { winner: color, path })
            }
            None => {
                self.current = color.opponent();
                debug!(next = %self.current, "Turn passes");
                Ok(Placement::Continue(self.current))
            }
        }
    }

    /// Plays a move, rejecting it if it names the wrong color.
    pub fn apply(&mut self, mv: Move) -> Result<Placement, MoveError> {
        if mv.color != self.current && self.winner.is_none() {
            return Err(MoveError::WrongColor(mv.color));
        }
        self.play(mv.position)
    }
}

impl Default for LocalGame {
    fn default() -> Self {
        Self::new()
    }
}
