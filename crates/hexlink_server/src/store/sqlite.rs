//! SQLite-backed match store.

use super::MatchStore;
use super::schema::matches;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use derive_new::new;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use hexlink_core::{Match, MatchId};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Row of the `matches` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, new)]
#[diesel(table_name = matches)]
struct StoredMatch {
    key: String,
    value: String,
    expires_at: i64,
}

/// Store persisting records in one SQLite table.
///
/// A single connection is shared behind a mutex and every query runs on
/// the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<SqliteConnection>>,
    ttl: Duration,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies migrations.
    ///
    /// Use `":memory:"` for a throwaway database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    #[instrument(skip(path), fields(path = %path))]
    pub fn open(path: &str, ttl: Duration) -> Result<Self, StoreError> {
        let mut conn = SqliteConnection::establish(path)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::new(format!("Migration error: {}", e)))?;
        info!(applied = applied.len(), "SQLite store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            ttl,
        })
    }

    fn row_for(&self, record: &Match) -> Result<StoredMatch, StoreError> {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        Ok(StoredMatch::new(
            record.id.storage_key(),
            serde_json::to_string(record)?,
            Utc::now().timestamp_millis().saturating_add(ttl_ms),
        ))
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::new(format!("Store task failed: {}", e)))?
    }
}

#[async_trait]
impl MatchStore for SqliteStore {
    #[instrument(skip(self), fields(match_id = %id))]
    async fn get(&self, id: &MatchId) -> Result<Option<Match>, StoreError> {
        let key = id.storage_key();
        let row = self
            .with_conn(move |conn| {
                let row = matches::table
                    .find(&key)
                    .select(StoredMatch::as_select())
                    .first(conn)
                    .optional()?;
                Ok(row)
            })
            .await?;

        match row {
            Some(row) if row.expires_at > Utc::now().timestamp_millis() => Ok(Some(serde_json::from_str(&row.value)?)),
            Some(_) => {
                debug!("Record expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, record), fields(match_id = %record.id))]
    async fn put(&self, record: &Match) -> Result<(), StoreError> {
        let row = self.row_for(record)?;
        self.with_conn(move |conn| {
            diesel::replace_into(matches::table).values(&row).execute(conn)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, record), fields(match_id = %record.id))]
    async fn insert_new(&self, record: &Match) -> Result<bool, StoreError> {
        let row = self.row_for(record)?;
        let now = Utc::now().timestamp_millis();
        self.with_conn(move |conn| {
            conn.immediate_transaction(|conn| {
                diesel::delete(
                    matches::table
                        .filter(matches::key.eq(&row.key))
                        .filter(matches::expires_at.le(now)),
                )
                .execute(conn)?;
                let inserted = diesel::insert_or_ignore_into(matches::table)
                    .values(&row)
                    .execute(conn)?;
                Ok::<_, StoreError>(inserted == 1)
            })
        })
        .await
    }
}
