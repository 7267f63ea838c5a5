//! The authoritative match record and its state machine.
//!
//! A [`Match`] moves `Waiting → Playing → Won` and never backwards. All
//! transitions here are pure: they validate, mutate in place only on
//! success, and leave the record untouched on rejection.

use crate::board::{Board, Color, Position};
use crate::game::place_stone;
use crate::match_id::MatchId;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Opaque self-issued player identifier.
pub type PlayerId = String;

/// Lifecycle phase of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Only the creator has a seat.
    #[display("waiting")]
    Waiting,
    /// Both seats taken, stones being placed.
    #[display("playing")]
    Playing,
    /// A winning chain exists. Terminal.
    #[display("won")]
    Won,
}

/// Error taxonomy shared by server and client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Bad or missing input.
    Validation,
    /// Unknown match.
    NotFound,
    /// Requester holds no seat.
    Authorization,
    /// Request conflicts with the current match state.
    StateConflict,
    /// Channel drop, fetch failure, storage failure.
    Transport,
}

/// Why the authority refused a request against an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Rejection {
    /// No match with that id.
    #[display("Game not found")]
    NotFound,
    /// Requester is neither seat.
    #[display("Not a player in this game")]
    NotAPlayer,
    /// Requester's color is not the color to move.
    #[display("Not your turn")]
    NotYourTurn,
    /// The match is waiting for an opponent or already won.
    #[display("Game is not in playing state")]
    NotPlaying,
    /// Coordinates off the board.
    #[display("Invalid position")]
    OutOfBounds,
    /// Target cell already holds a stone.
    #[display("Cell already occupied")]
    Occupied,
    /// Both seats are taken.
    #[display("Game already has 2 players")]
    AlreadyFull,
    /// Requester already holds a seat.
    #[display("Already joined this game")]
    AlreadyJoined,
}

impl Rejection {
    /// Taxonomy bucket for this rejection.
    pub fn kind(self) -> ErrorKind {
        match self {
            Rejection::NotFound => ErrorKind::NotFound,
            Rejection::NotAPlayer => ErrorKind::Authorization,
            Rejection::OutOfBounds => ErrorKind::Validation,
            Rejection::NotYourTurn
            | Rejection::NotPlaying
            | Rejection::Occupied
            | Rejection::AlreadyFull
            | Rejection::AlreadyJoined => ErrorKind::StateConflict,
        }
    }
}

impl std::error::Error for Rejection {}

/// Full snapshot of one online match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Short shareable code.
    pub id: MatchId,
    /// Current board.
    pub board: Board,
    /// Color to move next. Stays at the winner once won.
    pub current_player: Color,
    /// Creator's id.
    pub player1_id: PlayerId,
    /// Joiner's id, absent while waiting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player2_id: Option<PlayerId>,
    /// Creator's color.
    pub player1_color: Color,
    /// Joiner's color, always the complement of `player1_color`.
    pub player2_color: Color,
    /// Lifecycle phase.
    #[serde(rename = "gameState")]
    pub phase: Phase,
    /// Winner once won.
    pub winner: Option<Color>,
    /// Connecting chain once won, start edge first.
    pub winning_path: Vec<Position>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last join or move.
    pub last_move_at: DateTime<Utc>,
}

/// A snapshot tagged for one seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// The record.
    pub game_state: Match,
    /// The requester's color.
    pub your_color: Color,
    /// Whether the requester moves next.
    pub is_your_turn: bool,
}

impl Match {
    /// Creates a waiting match with the creator in seat one.
    #[instrument(skip(player1_id), fields(player1_id = %player1_id))]
    pub fn new(id: MatchId, player1_id: PlayerId, player1_color: Color, now: DateTime<Utc>) -> Self {
        info!(match_id = %id, color = %player1_color, "Creating match record");
        Self {
            id,
            board: Board::new(),
            current_player: Color::FIRST,
            player1_id,
            player2_id: None,
            player1_color,
            player2_color: player1_color.opponent(),
            phase: Phase::Waiting,
            winner: None,
            winning_path: Vec::new(),
            created_at: now,
            last_move_at: now,
        }
    }

    /// Returns the seat color held by `player_id`, if any.
    pub fn seat_of(&self, player_id: &str) -> Option<Color> {
        if self.player1_id == player_id {
            Some(self.player1_color)
        } else if self.player2_id.as_deref() == Some(player_id) {
            Some(self.player2_color)
        } else {
            None
        }
    }

    /// Whether the second seat is still free.
    pub fn has_opponent(&self) -> bool {
        self.player2_id.is_some()
    }

    /// Tags this record for the seat holding `player_id`.
    pub fn view_for(&self, player_id: &str) -> Result<PlayerView, Rejection> {
        let color = self.seat_of(player_id).ok_or(Rejection::NotAPlayer)?;
        Ok(self.view_as(color))
    }

    /// Tags this record for a known seat color.
    pub fn view_as(&self, color: Color) -> PlayerView {
        PlayerView {
            game_state: self.clone(),
            your_color: color,
            is_your_turn: self.current_player == color,
        }
    }

    /// Seats the second player and starts play.
    ///
    /// A requester who already holds either seat gets `AlreadyJoined`, even
    /// on a full match; anyone else gets `AlreadyFull` once both seats are
    /// taken.
    #[instrument(skip(self), fields(match_id = %self.id))]
    pub fn join(&mut self, player_id: &str, now: DateTime<Utc>) -> Result<Color, Rejection> {
        if self.seat_of(player_id).is_some() {
            warn!(player_id, "Player already seated");
            return Err(Rejection::AlreadyJoined);
        }
        if self.player2_id.is_some() {
            warn!(player_id, "Match already full");
            return Err(Rejection::AlreadyFull);
        }

        self.player2_id = Some(player_id.to_string());
        self.phase = Phase::Playing;
        self.last_move_at = now;

        info!(player_id, color = %self.player2_color, "Second player joined");
        Ok(self.player2_color)
    }

    /// Places the requester's stone at `(row, col)`.
    ///
    /// Checks run in a fixed order: seat, turn, phase, bounds, occupancy.
    /// On a winning placement the phase becomes `Won` and `current_player`
    /// stays on the winner; otherwise the turn passes.
    #[instrument(skip(self), fields(match_id = %self.id))]
    pub fn play(&mut self, player_id: &str, row: i64, col: i64, now: DateTime<Utc>) -> Result<Color, Rejection> {
        let color = self.seat_of(player_id).ok_or(Rejection::NotAPlayer)?;
        if self.current_player != color {
            debug!(%color, current = %self.current_player, "Move out of turn");
            return Err(Rejection::NotYourTurn);
        }
        if self.phase != Phase::Playing {
            debug!(phase = %self.phase, "Move outside playing phase");
            return Err(Rejection::NotPlaying);
        }
        let pos = Position::from_signed(row, col).ok_or(Rejection::OutOfBounds)?;
        if !self.board.is_empty(pos) {
            return Err(Rejection::Occupied);
        }

        let won = place_stone(&mut self.board, color, pos).map_err(|_| Rejection::Occupied)?;
        self.last_move_at = now;

        match won {
            Some(path) => {
                info!(%color, %pos, length = path.len(), "Winning move");
                self.phase = Phase::Won;
                self.winner = Some(color);
                self.winning_path = path;
            }
            None => {
                self.current_player = color.opponent();
                debug!(%color, %pos, next = %self.current_player, "Move applied");
            }
        }

        Ok(color)
    }
}
