//! REST client for the `/api/games` routes.

use crate::error::ClientError;
use hexlink_core::protocol::{ApiResponse, CreateResponse, JoinResponse, MoveRequest, MoveResponse, SeatRequest};
use hexlink_core::{Match, MatchId, PlayerView};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

/// Typed client for one match server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Client for the server at `base_url`, e.g. `http://127.0.0.1:8787`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a match seated by `player_id`.
    #[instrument(skip(self))]
    pub async fn create(&self, player_id: &str) -> Result<CreateResponse, ClientError> {
        let url = self.url("/api/games/create")?;
        let response = self.client.post(url).json(&SeatRequest::new(player_id)).send().await?;
        decode(response).await
    }

    /// Takes the second seat of `id`.
    #[instrument(skip(self), fields(match_id = %id))]
    pub async fn join(&self, id: &MatchId, player_id: &str) -> Result<JoinResponse, ClientError> {
        let url = self.url(&format!("/api/games/{}/join", id))?;
        let response = self.client.post(url).json(&SeatRequest::new(player_id)).send().await?;
        decode(response).await
    }

    /// Reads the authoritative snapshot for `player_id`.
    #[instrument(skip(self), fields(match_id = %id))]
    pub async fn snapshot(&self, id: &MatchId, player_id: &str) -> Result<PlayerView, ClientError> {
        let mut url = self.url(&format!("/api/games/{}", id))?;
        url.query_pairs_mut().append_pair("playerId", player_id);
        let response = self.client.get(url).send().await?;
        decode(response).await
    }

    /// Submits a move over the request path.
    #[instrument(skip(self), fields(match_id = %id))]
    pub async fn make_move(&self, id: &MatchId, player_id: &str, row: i64, col: i64) -> Result<Match, ClientError> {
        let url = self.url(&format!("/api/games/{}/move", id))?;
        let body = MoveRequest::new(player_id, row, col);
        let response = self.client.post(url).json(&body).send().await?;
        let MoveResponse { game_state } = decode(response).await?;
        Ok(game_state)
    }

    /// Realtime endpoint of `id` for `player_id`, with a `ws` or `wss` scheme.
    pub fn ws_url(&self, id: &MatchId, player_id: &str) -> Result<Url, ClientError> {
        let mut url = self.url(&format!("/api/games/{}/ws", id))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Config(format!("Cannot derive websocket url from {}", self.base_url)))?;
        url.query_pairs_mut().append_pair("playerId", player_id);
        Ok(url)
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ClientError::Config(format!("Invalid server url {}: {}", self.base_url, e)))
    }
}

/// Unwraps the `{success, data | error}` envelope.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
        warn!(status = status.as_u16(), error = %e, "Undecodable response body");
        if status.is_success() {
            ClientError::Protocol(e.to_string())
        } else {
            ClientError::Rejected {
                status: Some(status.as_u16()),
                message: status.to_string(),
            }
        }
    })?;

    if status.is_success() {
        envelope.into_result().map_err(ClientError::Protocol)
    } else {
        let message = envelope.error.unwrap_or_else(|| status.to_string());
        debug!(status = status.as_u16(), %message, "Request rejected");
        Err(ClientError::Rejected {
            status: Some(status.as_u16()),
            message,
        })
    }
}
