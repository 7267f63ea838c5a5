//! Client error types.

use derive_more::{Display, Error};
use hexlink_core::{ErrorKind, MoveError, Rejection};

/// Failure of a client operation.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ClientError {
    /// The request or channel failed before the server answered.
    #[display("Transport error: {}", _0)]
    Transport(#[error(not(source))] String),

    /// The server refused the request.
    ///
    /// `status` is absent for refusals delivered over the realtime channel.
    #[display("{}", message)]
    Rejected {
        /// HTTP status, if the refusal came over REST.
        status: Option<u16>,
        /// Server-supplied reason.
        message: String,
    },

    /// The server answered with something that does not decode.
    #[display("Protocol error: {}", _0)]
    Protocol(#[error(not(source))] String),

    /// An online move was refused locally before reaching the server.
    #[display("{}", _0)]
    LocalRejected(#[error(not(source))] Rejection),

    /// A same-device move broke the rules.
    #[display("{}", _0)]
    LocalMove(#[error(not(source))] MoveError),

    /// Local state could not be read or written.
    #[display("Persistence error: {}", _0)]
    Persistence(#[error(not(source))] String),

    /// Configuration could not be loaded.
    #[display("Config error: {}", _0)]
    Config(#[error(not(source))] String),

    /// The operation needs an attached online match.
    #[display("No online match attached")]
    NotAttached,
}

/// REST messages that signal bad input rather than a state conflict.
const VALIDATION_MESSAGES: [&str; 3] = ["playerId required", "Missing required fields", "Invalid position"];

impl ClientError {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(_) | ClientError::Protocol(_) | ClientError::Persistence(_) => ErrorKind::Transport,
            ClientError::Rejected { status, message } => match status {
                Some(404) => ErrorKind::NotFound,
                Some(403) => ErrorKind::Authorization,
                _ if message == "Game not found" => ErrorKind::NotFound,
                _ if message == "Not a player in this game" => ErrorKind::Authorization,
                _ if VALIDATION_MESSAGES.contains(&message.as_str()) => ErrorKind::Validation,
                Some(status) if *status >= 500 => ErrorKind::Transport,
                _ => ErrorKind::StateConflict,
            },
            ClientError::LocalRejected(rejection) => rejection.kind(),
            ClientError::LocalMove(_) => ErrorKind::StateConflict,
            ClientError::Config(_) | ClientError::NotAttached => ErrorKind::Validation,
        }
    }

    /// Whether the server no longer recognizes this player in the match.
    ///
    /// Such matches are dropped from the local directory.
    pub fn is_stale_link(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Authorization)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Protocol(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;

        match err {
            // A refused upgrade that names the match or seat as unknown is a
            // verdict, not a dropped connection.
            Error::Http(response) if matches!(response.status().as_u16(), 403 | 404) => {
                let status = response.status().as_u16();
                let body = response
                    .body()
                    .as_deref()
                    .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
                    .filter(|text| !text.is_empty());
                ClientError::refused_upgrade(status, body)
            }
            other => ClientError::Transport(other.to_string()),
        }
    }
}

impl ClientError {
    /// Builds the rejection for an upgrade refused with `status`.
    fn refused_upgrade(status: u16, body: Option<String>) -> Self {
        let message = body.unwrap_or_else(|| {
            if status == 404 {
                Rejection::NotFound.to_string()
            } else {
                Rejection::NotAPlayer.to_string()
            }
        });
        ClientError::Rejected {
            status: Some(status),
            message,
        }
    }
}

impl From<MoveError> for ClientError {
    fn from(err: MoveError) -> Self {
        ClientError::LocalMove(err)
    }
}
