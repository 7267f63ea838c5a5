//! Process-local match store.

use super::MatchStore;
use crate::error::StoreError;
use async_trait::async_trait;
use hexlink_core::{Match, MatchId};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Map-backed store holding serialized records with expiry.
///
/// Records go through JSON like the durable backend so both behave the
/// same with respect to encoding.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MemoryStore {
    /// Creates an empty store whose writes live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops every expired entry so keys nobody reads again do not pile up.
    fn evict_expired(entries: &mut HashMap<String, Entry>) {
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted expired records");
        }
    }

    fn entry_for(&self, record: &Match) -> Result<Entry, StoreError> {
        Ok(Entry {
            value: serde_json::to_string(record)?,
            expires_at: Instant::now() + self.ttl,
        })
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    #[instrument(skip(self), fields(match_id = %id))]
    async fn get(&self, id: &MatchId) -> Result<Option<Match>, StoreError> {
        let key = id.storage_key();
        let mut entries = self.entries();
        match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(serde_json::from_str(&entry.value)?)),
            Some(_) => {
                debug!("Record expired");
                entries.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, record), fields(match_id = %record.id))]
    async fn put(&self, record: &Match) -> Result<(), StoreError> {
        let entry = self.entry_for(record)?;
        let mut entries = self.entries();
        Self::evict_expired(&mut entries);
        entries.insert(record.id.storage_key(), entry);
        Ok(())
    }

    #[instrument(skip(self, record), fields(match_id = %record.id))]
    async fn insert_new(&self, record: &Match) -> Result<bool, StoreError> {
        let entry = self.entry_for(record)?;
        let key = record.id.storage_key();
        let mut entries = self.entries();
        Self::evict_expired(&mut entries);
        if entries.contains_key(&key) {
            debug!("Key already taken");
            return Ok(false);
        }
        entries.insert(key, entry);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hexlink_core::Color;

    fn record(id: &str) -> Match {
        Match::new(MatchId::parse(id).unwrap(), "p1".into(), Color::Blue, Utc::now())
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::new(Duration::from_secs(60));
        let game = record("MEM001");
        store.put(&game).await.unwrap();
        assert_eq!(store.get(&game.id).await.unwrap(), Some(game));
    }

    #[tokio::test]
    async fn test_insert_new_refuses_live_key() {
        let store = MemoryStore::new(Duration::from_secs(60));
        let game = record("MEM002");
        assert!(store.insert_new(&game).await.unwrap());
        assert!(!store.insert_new(&game).await.unwrap());
    }

    #[tokio::test]
    async fn test_records_expire() {
        let store = MemoryStore::new(Duration::from_millis(20));
        let game = record("MEM003");
        store.put(&game).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get(&game.id).await.unwrap(), None);
        assert!(store.insert_new(&game).await.unwrap());
    }

    #[tokio::test]
    async fn test_writes_evict_unread_expired_records() {
        let store = MemoryStore::new(Duration::from_millis(20));
        store.put(&record("OLD001")).await.unwrap();
        store.insert_new(&record("OLD002")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        store.put(&record("NEW001")).await.unwrap();
        assert_eq!(store.entries().len(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.insert_new(&record("NEW002")).await.unwrap());
        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("game:NEW002"));
    }
}
