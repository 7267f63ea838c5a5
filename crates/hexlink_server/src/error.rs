//! Server error types.

use derive_more::{Display, Error};
use hexlink_core::{ErrorKind, Rejection};
use tracing::instrument;

/// Failure of a coordinator operation.
#[derive(Debug, Clone, Display, Error)]
pub enum MatchError {
    /// A required request field was absent.
    #[display("{}", _0)]
    MissingField(#[error(not(source))] &'static str),
    /// No match with that id.
    #[display("Game not found")]
    NotFound,
    /// Requester holds no seat in the match.
    #[display("Not a player in this game")]
    NotAPlayer,
    /// Requester's color is not the color to move.
    #[display("Not your turn")]
    NotYourTurn,
    /// The match is waiting or already won.
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
    /// Every generated id collided with a live match.
    #[display("Could not allocate a game id after {} attempts", _0)]
    IdExhausted(#[error(not(source))] usize),
    /// The backing store failed.
    #[display("{}", _0)]
    Store(StoreError),
    /// The match coordinator could not be reached.
    #[display("Game coordinator unavailable")]
    Unavailable,
}

/// Message for a create/join/snapshot request without `playerId`.
pub const PLAYER_ID_REQUIRED: &str = "playerId required";

/// Message for a move request missing any of its fields.
pub const MISSING_FIELDS: &str = "Missing required fields";

impl MatchError {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatchError::MissingField(_) | MatchError::OutOfBounds => ErrorKind::Validation,
            MatchError::NotFound => ErrorKind::NotFound,
            MatchError::NotAPlayer => ErrorKind::Authorization,
            MatchError::NotYourTurn
            | MatchError::NotPlaying
            | MatchError::Occupied
            | MatchError::AlreadyFull
            | MatchError::AlreadyJoined => ErrorKind::StateConflict,
            MatchError::IdExhausted(_) | MatchError::Store(_) | MatchError::Unavailable => ErrorKind::Transport,
        }
    }
}

impl From<Rejection> for MatchError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::NotFound => MatchError::NotFound,
            Rejection::NotAPlayer => MatchError::NotAPlayer,
            Rejection::NotYourTurn => MatchError::NotYourTurn,
            Rejection::NotPlaying => MatchError::NotPlaying,
            Rejection::OutOfBounds => MatchError::OutOfBounds,
            Rejection::Occupied => MatchError::Occupied,
            Rejection::AlreadyFull => MatchError::AlreadyFull,
            Rejection::AlreadyJoined => MatchError::AlreadyJoined,
        }
    }
}

impl From<StoreError> for MatchError {
    fn from(err: StoreError) -> Self {
        MatchError::Store(err)
    }
}

/// Match store error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Store error: {} at {}:{}", message, file, line)]
pub struct StoreError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Record encoding error: {}", err))
    }
}

#[cfg(feature = "sqlite")]
impl From<diesel::result::Error> for StoreError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::new(format!("Diesel error: {}", err))
    }
}

#[cfg(feature = "sqlite")]
impl From<diesel::ConnectionError> for StoreError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(format!("Connection error: {}", err))
    }
}
