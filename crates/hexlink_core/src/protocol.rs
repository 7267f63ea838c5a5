//! Wire protocol shared by the server and its clients.
//!
//! Realtime frames are closed tagged enums, one per direction. Text that
//! does not decode into a known variant is classified rather than dropped,
//! so each side can answer or log it explicitly.

use crate::board::Color;
use crate::match_id::MatchId;
use crate::record::{Match, PlayerId, PlayerView};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Liveness probe text frame.
pub const PING: &str = "ping";

/// Reply to [`PING`].
pub const PONG: &str = "pong";

/// Client → server realtime message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Place a stone for the sender's seat.
    Move {
        /// Row, possibly out of range.
        row: i64,
        /// Column, possibly out of range.
        col: i64,
    },
}

/// Server → client realtime message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot tagged for the recipient.
    State(PlayerView),
    /// A request from this session was refused.
    Error {
        /// Human readable reason.
        message: String,
    },
    /// The other seat attached a session.
    OpponentConnected,
    /// A session of the other seat went away.
    OpponentDisconnected,
}

/// Message families with a fixed set of `type` tags.
pub trait Tagged: DeserializeOwned {
    /// Every tag the family understands.
    const TAGS: &'static [&'static str];
}

impl Tagged for ClientMessage {
    const TAGS: &'static [&'static str] = &["move"];
}

impl Tagged for ServerMessage {
    const TAGS: &'static [&'static str] = &["state", "error", "opponent_connected", "opponent_disconnected"];
}

/// Classification of one inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<T> {
    /// A well-formed known message.
    Message(T),
    /// Valid JSON with a `type` this side does not know.
    Unrecognized(String),
    /// Not JSON, no `type`, or a known `type` with bad fields.
    Malformed(String),
}

impl<T: Tagged> Frame<T> {
    /// Classifies a text frame.
    pub fn parse(text: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return Frame::Malformed(e.to_string()),
        };
        let Some(tag) = value.get("type").and_then(|t| t.as_str()) else {
            return Frame::Malformed("missing \"type\" field".to_string());
        };
        if !T::TAGS.contains(&tag) {
            return Frame::Unrecognized(tag.to_string());
        }
        match serde_json::from_value(value) {
            Ok(message) => Frame::Message(message),
            Err(e) => Frame::Malformed(e.to_string()),
        }
    }
}

/// Uniform `{success, data | error}` envelope for REST responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was applied.
    pub success: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Reason on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful envelope.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed envelope.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Collapses the envelope into its payload or its error text.
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(error)) => Err(error),
            (true, None, None) => Err("response carried no data".to_string()),
            (false, _, None) => Err("request failed".to_string()),
        }
    }
}

/// `POST /create` and `POST /{id}/join` body.
///
/// The id is optional so its absence can be reported as a validation error
/// instead of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRequest {
    /// Requesting player.
    #[serde(default)]
    pub player_id: Option<PlayerId>,
}

impl SeatRequest {
    /// Body naming `player_id`.
    pub fn new(player_id: impl Into<PlayerId>) -> Self {
        Self {
            player_id: Some(player_id.into()),
        }
    }
}

/// `POST /create` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    /// The new match code.
    pub game_id: MatchId,
    /// Echo of the creator's id.
    pub player_id: PlayerId,
    /// Creator's randomly drawn color.
    pub player_color: Color,
    /// Link that opens the match for the second player.
    pub share_link: String,
}

/// `POST /{id}/join` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    /// Echo of the joiner's id.
    pub player_id: PlayerId,
    /// Joiner's color.
    pub player_color: Color,
    /// The record after the join.
    pub game_state: Match,
}

/// `POST /{id}/move` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// Requesting player.
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    /// Target row.
    #[serde(default)]
    pub row: Option<i64>,
    /// Target column.
    #[serde(default)]
    pub col: Option<i64>,
}

impl MoveRequest {
    /// Fully populated body.
    pub fn new(player_id: impl Into<PlayerId>, row: i64, col: i64) -> Self {
        Self {
            player_id: Some(player_id.into()),
            row: Some(row),
            col: Some(col),
        }
    }
}

/// `POST /{id}/move` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    /// The record after the move.
    pub game_state: Match,
}

/// `?playerId=` query of the snapshot and upgrade routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerQuery {
    /// Requesting player.
    #[serde(default)]
    pub player_id: Option<PlayerId>,
}
