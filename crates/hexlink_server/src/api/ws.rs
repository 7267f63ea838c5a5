//! Realtime channel: `GET /api/games/{id}/ws?playerId=`.

use super::AppState;
use crate::coordinator::Registry;
use crate::error::MatchError;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use hexlink_core::protocol::{ClientMessage, Frame, PING, PONG, PlayerQuery, ServerMessage};
use hexlink_core::{MatchId, PlayerId};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Validates the request, then upgrades it into a match session.
///
/// Checks run in order: `playerId` present (400), upgrade request (426),
/// match exists (404), requester seated (403).
#[instrument(skip(state, upgrade))]
pub(super) async fn upgrade(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PlayerQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(player_id) = query.player_id.filter(|p| !p.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "playerId query param required").into_response();
    };
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            debug!(%rejection, "Not an upgrade request");
            return (StatusCode::UPGRADE_REQUIRED, "Expected Upgrade: websocket").into_response();
        }
    };
    let Ok(id) = MatchId::parse(&id) else {
        return (StatusCode::NOT_FOUND, "Game not found").into_response();
    };

    if let Err(e) = state.registry().snapshot(&id, &player_id).await {
        if !matches!(e, MatchError::NotFound | MatchError::NotAPlayer) {
            warn!(error = %e, "Upgrade check failed");
        }
        return (super::status_for(&e), e.to_string()).into_response();
    }

    let registry = state.registry().clone();
    upgrade.on_upgrade(move |socket| run_session(registry, id, player_id, socket))
}

/// Serves one socket until it closes.
///
/// A writer task drains the session's outbox and the liveness replies;
/// this task reads frames and forwards moves to the coordinator.
#[instrument(skip(registry, socket), fields(match_id = %id))]
async fn run_session(registry: Registry, id: MatchId, player_id: PlayerId, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerMessage>();
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                Some(message) = inbox.recv() => match serde_json::to_string(&message) {
                    Ok(text) => Message::Text(text.into()),
                    Err(e) => {
                        warn!(error = %e, "Failed to encode server message");
                        continue;
                    }
                },
                Some(raw) = raw_rx.recv() => raw,
                else => break,
            };
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    let session = match registry.attach(&id, &player_id, outbox.clone()).await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Attach failed");
            let _ = outbox.send(ServerMessage::Error { message: e.to_string() });
            drop(outbox);
            drop(raw_tx);
            let _ = writer.await;
            return;
        }
    };
    info!(color = %session.color(), "Realtime session open");

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) if text.as_str() == PING => {
                let _ = raw_tx.send(Message::Text(PONG.into()));
            }
            Message::Text(text) => match Frame::<ClientMessage>::parse(text.as_str()) {
                Frame::Message(ClientMessage::Move { row, col }) => session.submit_move(row, col).await,
                Frame::Unrecognized(tag) => {
                    debug!(tag = %tag, "Unrecognized message type");
                    let _ = outbox.send(ServerMessage::Error {
                        message: format!("Unknown message type: {}", tag),
                    });
                }
                Frame::Malformed(reason) => {
                    debug!(reason = %reason, "Malformed frame");
                    let _ = outbox.send(ServerMessage::Error {
                        message: "Invalid JSON".to_string(),
                    });
                }
            },
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    info!("Realtime session closed");
    session.detach().await;
    writer.abort();
}
