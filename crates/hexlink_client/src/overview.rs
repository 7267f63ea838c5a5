//! Summaries of every tracked match.

use crate::agent::SyncHandle;
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::local_store::LocalStore;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use hexlink_core::{Color, MatchId, Phase, PlayerView};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// One row of the games overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    /// Match code.
    pub id: MatchId,
    /// Lifecycle phase.
    pub phase: Phase,
    /// Color to move.
    pub current_player: Color,
    /// Winner once won.
    pub winner: Option<Color>,
    /// Local player's color.
    pub your_color: Color,
    /// Whether the local player moves next.
    pub is_your_turn: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last join or move.
    pub last_move_at: DateTime<Utc>,
}

impl From<PlayerView> for MatchSummary {
    fn from(view: PlayerView) -> Self {
        let game = view.game_state;
        Self {
            id: game.id,
            phase: game.phase,
            current_player: game.current_player,
            winner: game.winner,
            your_color: view.your_color,
            is_your_turn: view.is_your_turn,
            created_at: game.created_at,
            last_move_at: game.last_move_at,
        }
    }
}

/// Loads a summary of every tracked match, most recently played first.
///
/// Expired entries are pruned first. Matches the server no longer knows,
/// or that no longer seat this player, are untracked and left out. Any
/// other failure is returned after those removals are saved.
#[instrument(skip(api, store))]
pub async fn load_overview(
    api: &ApiClient,
    store: &mut LocalStore,
    now: DateTime<Utc>,
) -> Result<Vec<MatchSummary>, ClientError> {
    let local_player = store.player_id()?;
    let tracked = store.prune(now)?;
    if tracked.is_empty() {
        return Ok(Vec::new());
    }

    let seats: Vec<(String, String)> = tracked
        .iter()
        .map(|game_id| {
            let player_id = store.match_player(game_id).unwrap_or(&local_player).to_string();
            (game_id.clone(), player_id)
        })
        .collect();

    let lookups = seats.iter().map(|(game_id, player_id)| async move {
        let id = MatchId::parse(game_id).map_err(|e| ClientError::Rejected {
            status: Some(404),
            message: e.to_string(),
        })?;
        api.snapshot(&id, player_id).await
    });
    let results = join_all(lookups).await;

    let mut summaries = Vec::new();
    let mut failure = None;
    for ((game_id, _), result) in seats.iter().zip(results) {
        match result {
            Ok(view) => summaries.push(MatchSummary::from(view)),
            Err(e) if e.is_stale_link() => {
                info!(game_id = %game_id, error = %e, "Untracking stale match");
                store.forget_match(game_id)?;
            }
            Err(e) => {
                warn!(game_id = %game_id, error = %e, "Failed to load match");
                failure.get_or_insert(e);
            }
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }

    summaries.sort_by(|a, b| b.last_move_at.cmp(&a.last_move_at));
    Ok(summaries)
}

/// Attaches `agent` to a match, refreshing or dropping its directory entry.
///
/// The seat is the one remembered for this match, falling back to the local
/// player id. A server that no longer knows the match or seat causes the
/// entry to be untracked before the error is returned.
#[instrument(skip(agent, store), fields(match_id = %id))]
pub async fn resume_match(
    agent: &SyncHandle,
    store: &mut LocalStore,
    id: MatchId,
    now: DateTime<Utc>,
) -> Result<PlayerView, ClientError> {
    let player_id = match store.match_player(id.as_str()) {
        Some(known) => known.to_string(),
        None => store.player_id()?,
    };
    match agent.attach(id.clone(), player_id.clone()).await {
        Ok(view) => {
            store.remember_match(id.as_str(), &player_id, now)?;
            Ok(view)
        }
        Err(e) if e.is_stale_link() => {
            info!(error = %e, "Untracking stale match");
            store.forget_match(id.as_str())?;
            Err(e)
        }
        Err(e) => Err(e),
    }
}
