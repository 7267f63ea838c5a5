//! Client-local persistence: identity, per-match player ids and the
//! match directory, kept in one JSON file.
//!
//! Nothing here is authoritative. Unreadable or malformed content is
//! treated as empty rather than failing.

use crate::directory::{MatchDirectory, TrackedMatch};
use crate::error::ClientError;
use chrono::{DateTime, Utc};
use hexlink_core::PlayerId;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Serialized form of the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocalState {
    #[serde(skip_serializing_if = "Option::is_none")]
    player_id: Option<PlayerId>,
    match_players: BTreeMap<String, PlayerId>,
    tracked_matches: MatchDirectory,
}

impl LocalState {
    /// Salvages whatever well-formed parts `text` contains.
    fn parse_lenient(text: &str) -> Self {
        let Ok(Value::Object(root)) = serde_json::from_str::<Value>(text) else {
            warn!("Local state is not a JSON object, starting empty");
            return Self::default();
        };

        let player_id = root
            .get("playerId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let match_players: BTreeMap<String, PlayerId> = root
            .get("matchPlayers")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(id, player)| player.as_str().map(|p| (id.clone(), p.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let tracked: Vec<TrackedMatch> = root
            .get("trackedMatches")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let game_id = item.get("gameId")?.as_str()?;
                        let tracked_at = item.get("trackedAt")?.as_i64()?;
                        Some(TrackedMatch {
                            game_id: game_id.to_string(),
                            tracked_at,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            player_id,
            match_players,
            tracked_matches: MatchDirectory::from_entries(tracked),
        }
    }
}

/// File-backed local state.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    state: LocalState,
}

impl LocalStore {
    /// Loads the state file at `path`. A missing or malformed file yields
    /// an empty store.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(text) => LocalState::parse_lenient(&text),
            Err(e) => {
                debug!(error = %e, "No readable local state");
                LocalState::default()
            }
        };
        Self { path, state }
    }

    /// The stable self-issued player id, created on first use.
    pub fn player_id(&mut self) -> Result<PlayerId, ClientError> {
        if let Some(id) = &self.state.player_id {
            return Ok(id.clone());
        }
        let id = uuid::Uuid::new_v4().to_string();
        info!(player_id = %id, "Issued local player id");
        self.state.player_id = Some(id.clone());
        self.save()?;
        Ok(id)
    }

    /// Player id last used for `game_id`, if any.
    pub fn match_player(&self, game_id: &str) -> Option<&str> {
        self.state.match_players.get(game_id).map(String::as_str)
    }

    /// Records that `player_id` holds a seat in `game_id` and tracks it.
    pub fn remember_match(&mut self, game_id: &str, player_id: &str, now: DateTime<Utc>) -> Result<(), ClientError> {
        self.state
            .match_players
            .insert(game_id.to_string(), player_id.to_string());
        self.state.tracked_matches.track(game_id, now);
        self.save()
    }

    /// Stops tracking `game_id`.
    pub fn forget_match(&mut self, game_id: &str) -> Result<(), ClientError> {
        let untracked = self.state.tracked_matches.untrack(game_id);
        let unmapped = self.state.match_players.remove(game_id).is_some();
        if untracked || unmapped {
            self.save()?;
        }
        Ok(())
    }

    /// Prunes expired entries and returns the remaining codes, most recent
    /// first.
    pub fn prune(&mut self, now: DateTime<Utc>) -> Result<Vec<String>, ClientError> {
        if self.state.tracked_matches.prune(now) {
            let live = self.state.tracked_matches.ids();
            self.state.match_players.retain(|id, _| live.contains(id));
            self.save()?;
        }
        Ok(self.state.tracked_matches.ids())
    }

    /// The match directory.
    pub fn directory(&self) -> &MatchDirectory {
        &self.state.tracked_matches
    }

    fn save(&self) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Persistence(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let text = serde_json::to_string_pretty(&self.state)
            .map_err(|e| ClientError::Persistence(format!("Failed to encode local state: {}", e)))?;
        std::fs::write(&self.path, text)
            .map_err(|e| ClientError::Persistence(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}
