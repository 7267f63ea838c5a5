//! HTTP routes under `/api/games`.
//!
//! Every REST response uses the `{success, data | error}` envelope. The
//! realtime upgrade route lives in [`ws`].

mod ws;

use crate::coordinator::Registry;
use crate::error::{MISSING_FIELDS, MatchError, PLAYER_ID_REQUIRED};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hexlink_core::protocol::{ApiResponse, CreateResponse, JoinResponse, MoveRequest, MoveResponse, PlayerQuery, SeatRequest};
use hexlink_core::{MatchId, PlayerView};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{debug, instrument, warn};

/// Shared state of every route.
#[derive(Debug, Clone)]
pub struct AppState {
    registry: Registry,
    share_origin: Arc<str>,
}

impl AppState {
    /// Bundles the registry with the origin used in share links.
    pub fn new(registry: Registry, share_origin: impl Into<Arc<str>>) -> Self {
        Self {
            registry,
            share_origin: share_origin.into(),
        }
    }

    /// The coordinator registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn share_link(&self, id: &MatchId) -> String {
        format!("{}/?game={}", self.share_origin, id)
    }
}

/// Builds the router with request logging.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/games/create", post(create_match))
        .route("/api/games/{id}", get(snapshot))
        .route("/api/games/{id}/join", post(join_match))
        .route("/api/games/{id}/move", post(make_move))
        .route("/api/games/{id}/ws", get(ws::upgrade))
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            debug!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
        .with_state(state)
}

/// A [`MatchError`] rendered as an enveloped HTTP response.
#[derive(Debug)]
pub struct ApiError(pub MatchError);

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        Self(err)
    }
}

/// HTTP status for a coordinator error.
pub fn status_for(err: &MatchError) -> StatusCode {
    match err {
        MatchError::MissingField(_)
        | MatchError::OutOfBounds
        | MatchError::NotYourTurn
        | MatchError::NotPlaying
        | MatchError::Occupied
        | MatchError::AlreadyFull
        | MatchError::AlreadyJoined => StatusCode::BAD_REQUEST,
        MatchError::NotFound => StatusCode::NOT_FOUND,
        MatchError::NotAPlayer => StatusCode::FORBIDDEN,
        MatchError::IdExhausted(_) | MatchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        MatchError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match &self.0 {
            // Store details stay in the log.
            MatchError::Store(_) => "Internal storage error".to_string(),
            other => other.to_string(),
        };
        (status, Json(ApiResponse::<()>::err(message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Invalid codes cannot name a stored match.
fn parse_id(raw: &str) -> Result<MatchId, MatchError> {
    MatchId::parse(raw).map_err(|_| MatchError::NotFound)
}

fn require_player(player_id: Option<String>) -> Result<String, MatchError> {
    player_id
        .filter(|id| !id.is_empty())
        .ok_or(MatchError::MissingField(PLAYER_ID_REQUIRED))
}

#[instrument(skip(state, body))]
async fn create_match(State(state): State<AppState>, body: Result<Json<SeatRequest>, JsonRejection>) -> ApiResult<CreateResponse> {
    let Json(body) = body.map_err(|e| {
        warn!(error = %e, "Unreadable create body");
        MatchError::MissingField(PLAYER_ID_REQUIRED)
    })?;
    let player_id = require_player(body.player_id)?;

    let record = state.registry.create(&player_id).await?;
    Ok(Json(ApiResponse::ok(CreateResponse {
        share_link: state.share_link(&record.id),
        game_id: record.id,
        player_id: record.player1_id,
        player_color: record.player1_color,
    })))
}

#[instrument(skip(state, body))]
async fn join_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SeatRequest>, JsonRejection>,
) -> ApiResult<JoinResponse> {
    let id = parse_id(&id)?;
    let Json(body) = body.map_err(|_| MatchError::MissingField(PLAYER_ID_REQUIRED))?;
    let player_id = require_player(body.player_id)?;

    let (player_color, game_state) = state.registry.join(&id, &player_id).await?;
    Ok(Json(ApiResponse::ok(JoinResponse {
        player_id,
        player_color,
        game_state,
    })))
}

#[instrument(skip(state))]
async fn snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PlayerQuery>,
) -> ApiResult<PlayerView> {
    let player_id = require_player(query.player_id)?;
    let id = parse_id(&id)?;
    let view = state.registry.snapshot(&id, &player_id).await?;
    Ok(Json(ApiResponse::ok(view)))
}

#[instrument(skip(state, body))]
async fn make_move(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<MoveRequest>, JsonRejection>,
) -> ApiResult<MoveResponse> {
    let Json(body) = body.map_err(|_| MatchError::MissingField(MISSING_FIELDS))?;
    let (Some(player_id), Some(row), Some(col)) = (body.player_id.filter(|p| !p.is_empty()), body.row, body.col) else {
        return Err(MatchError::MissingField(MISSING_FIELDS).into());
    };
    let id = parse_id(&id)?;

    let game_state = state.registry.make_move(&id, &player_id, row, col).await?;
    Ok(Json(ApiResponse::ok(MoveResponse { game_state })))
}
