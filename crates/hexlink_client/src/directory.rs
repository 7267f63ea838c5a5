//! Bounded, most-recent-first list of matches this client takes part in.
//!
//! Purely local bookkeeping. The server never sees it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Most entries kept.
pub const MAX_TRACKED_MATCHES: usize = 50;

/// Entries older than this many days are pruned.
pub const TRACKED_RETENTION_DAYS: i64 = 30;

/// One tracked match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedMatch {
    /// Match code as it was shared.
    pub game_id: String,
    /// Last touch, in milliseconds since the Unix epoch.
    pub tracked_at: i64,
}

/// The tracked-match list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchDirectory {
    entries: Vec<TrackedMatch>,
}

impl MatchDirectory {
    /// Directory over already-validated entries, trimmed to the bound.
    pub fn from_entries(mut entries: Vec<TrackedMatch>) -> Self {
        entries.truncate(MAX_TRACKED_MATCHES);
        Self { entries }
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> &[TrackedMatch] {
        &self.entries
    }

    /// Tracked codes, most recent first.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.game_id.clone()).collect()
    }

    /// Adds `game_id` or refreshes it, moving it to the front.
    pub fn track(&mut self, game_id: &str, now: DateTime<Utc>) {
        self.entries.retain(|entry| entry.game_id != game_id);
        self.entries.insert(
            0,
            TrackedMatch {
                game_id: game_id.to_string(),
                tracked_at: now.timestamp_millis(),
            },
        );
        self.entries.truncate(MAX_TRACKED_MATCHES);
    }

    /// Removes `game_id`. Returns whether it was present.
    pub fn untrack(&mut self, game_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.game_id != game_id);
        self.entries.len() != before
    }

    /// Drops entries past the retention window. Returns whether any went.
    pub fn prune(&mut self, now: DateTime<Utc>) -> bool {
        let cutoff = (now - Duration::days(TRACKED_RETENTION_DAYS)).timestamp_millis();
        let before = self.entries.len();
        self.entries.retain(|entry| entry.tracked_at >= cutoff);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "Pruned expired tracked matches");
        }
        removed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(days: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::days(days)
    }

    #[test]
    fn test_track_moves_to_front() {
        let mut dir = MatchDirectory::default();
        dir.track("AAAAAA", at(0));
        dir.track("BBBBBB", at(1));
        dir.track("AAAAAA", at(2));
        assert_eq!(dir.ids(), vec!["AAAAAA", "BBBBBB"]);
        assert_eq!(dir.entries()[0].tracked_at, at(2).timestamp_millis());
    }

    #[test]
    fn test_track_trims_to_bound() {
        let mut dir = MatchDirectory::default();
        for i in 0..(MAX_TRACKED_MATCHES + 5) {
            dir.track(&format!("M{:05}", i), at(0));
        }
        assert_eq!(dir.entries().len(), MAX_TRACKED_MATCHES);
        assert_eq!(dir.ids()[0], format!("M{:05}", MAX_TRACKED_MATCHES + 4));
        assert!(!dir.ids().contains(&"M00000".to_string()));
    }

    #[test]
    fn test_prune_keeps_boundary() {
        let mut dir = MatchDirectory::default();
        dir.track("OLD000", at(0));
        dir.track("EDGE00", at(1));
        dir.track("NEW000", at(20));

        assert!(dir.prune(at(31)));
        assert_eq!(dir.ids(), vec!["NEW000", "EDGE00"]);
        assert!(!dir.prune(at(31)));
    }

    #[test]
    fn test_untrack() {
        let mut dir = MatchDirectory::default();
        dir.track("AAAAAA", at(0));
        assert!(dir.untrack("AAAAAA"));
        assert!(!dir.untrack("AAAAAA"));
        assert!(dir.entries().is_empty());
    }
}
