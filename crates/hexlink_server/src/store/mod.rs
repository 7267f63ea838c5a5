//! Durable keyed storage of match records.
//!
//! Records live under `game:{id}` as JSON and expire after a fixed TTL that
//! restarts on every write. The coordinator is the only writer for a given
//! key, so the store needs last-write-wins `put` plus one conditional write,
//! [`MatchStore::insert_new`], to reserve fresh ids.

mod memory;
#[cfg(feature = "sqlite")]
mod schema;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::config::{ServerConfig, StoreConfig};
use crate::error::StoreError;
use async_trait::async_trait;
use hexlink_core::{Match, MatchId};
use std::sync::Arc;
use tracing::{info, instrument};

/// Keyed match storage with expiry.
#[async_trait]
pub trait MatchStore: Send + Sync + 'static {
    /// Reads a live record. Expired records read as absent.
    async fn get(&self, id: &MatchId) -> Result<Option<Match>, StoreError>;

    /// Writes a record unconditionally and restarts its TTL.
    async fn put(&self, record: &Match) -> Result<(), StoreError>;

    /// Writes a record only if no live record holds its key.
    ///
    /// Returns `false` when the key is taken.
    async fn insert_new(&self, record: &Match) -> Result<bool, StoreError>;
}

/// Opens the store named by the configuration.
#[instrument(skip(config), fields(store = ?config.store()))]
pub fn open_store(config: &ServerConfig) -> Result<Arc<dyn MatchStore>, StoreError> {
    let ttl = config.match_ttl();
    match config.store() {
        StoreConfig::Memory => {
            info!("Using in-memory match store");
            Ok(Arc::new(MemoryStore::new(ttl)))
        }
        #[cfg(feature = "sqlite")]
        StoreConfig::Sqlite { path } => {
            info!(path = %path, "Using SQLite match store");
            Ok(Arc::new(SqliteStore::open(path, ttl)?))
        }
        #[cfg(not(feature = "sqlite"))]
        StoreConfig::Sqlite { .. } => Err(StoreError::new("built without the sqlite feature")),
    }
}
