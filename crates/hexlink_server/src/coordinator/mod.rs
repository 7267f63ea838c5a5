//! Per-match coordinators and the registry that addresses them.
//!
//! Every mutating request for a match id goes through the single
//! coordinator task bound to that id. Coordinators start lazily on first
//! use and retire after a quiet period; the registry guarantees at most one
//! live coordinator per id.

mod actor;

pub use actor::{Outbox, SessionId};

use crate::config::ServerConfig;
use crate::error::{MatchError, PLAYER_ID_REQUIRED};
use crate::store::MatchStore;
use actor::{Command, Coordinator, Reply};
use chrono::Utc;
use hexlink_core::{Color, Match, MatchId, PlayerView};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

/// Mailbox capacity of one coordinator.
const MAILBOX_CAPACITY: usize = 64;

/// Deliveries attempted before a request reports [`MatchError::Unavailable`].
const DELIVERY_ATTEMPTS: usize = 4;

#[derive(Debug)]
pub(crate) struct Slot {
    generation: u64,
    mailbox: mpsc::Sender<Command>,
}

pub(crate) type Slots = Arc<Mutex<HashMap<MatchId, Slot>>>;

struct RegistryInner {
    store: Arc<dyn MatchStore>,
    slots: Slots,
    generations: AtomicU64,
    idle: Duration,
    id_attempts: usize,
}

/// Entry point for every match operation.
///
/// Cheap to clone; clones share coordinators.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("live", &self.live_coordinators())
            .field("idle", &self.inner.idle)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Creates a registry over `store`.
    #[instrument(skip(store, config))]
    pub fn new(store: Arc<dyn MatchStore>, config: &ServerConfig) -> Self {
        Self::with_limits(store, config.coordinator_idle(), *config.id_attempts())
    }

    /// Creates a registry with explicit idle timeout and id attempts.
    pub fn with_limits(store: Arc<dyn MatchStore>, idle: Duration, id_attempts: usize) -> Self {
        info!(?idle, id_attempts, "Creating coordinator registry");
        Self {
            inner: Arc::new(RegistryInner {
                store,
                slots: Arc::new(Mutex::new(HashMap::new())),
                generations: AtomicU64::new(0),
                idle,
                id_attempts: id_attempts.max(1),
            }),
        }
    }

    /// Number of coordinators currently running.
    pub fn live_coordinators(&self) -> usize {
        self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Creates a waiting match seated by `player_id` with a random color.
    ///
    /// Ids are drawn until one is reserved through the store's
    /// create-if-absent write.
    #[instrument(skip(self))]
    pub async fn create(&self, player_id: &str) -> Result<Match, MatchError> {
        if player_id.is_empty() {
            return Err(MatchError::MissingField(PLAYER_ID_REQUIRED));
        }
        let color = if rand::random::<bool>() { Color::Blue } else { Color::Red };

        for attempt in 1..=self.inner.id_attempts {
            let id = MatchId::generate(&mut rand::thread_rng());
            let record = Match::new(id, player_id.to_string(), color, Utc::now());
            if self.inner.store.insert_new(&record).await? {
                info!(match_id = %record.id, %color, attempt, "Match created");
                return Ok(record);
            }
            warn!(match_id = %record.id, attempt, "Match id collision");
        }

        Err(MatchError::IdExhausted(self.inner.id_attempts))
    }

    /// Seats `player_id` as the second player.
    #[instrument(skip(self), fields(match_id = %id))]
    pub async fn join(&self, id: &MatchId, player_id: &str) -> Result<(Color, Match), MatchError> {
        if player_id.is_empty() {
            return Err(MatchError::MissingField(PLAYER_ID_REQUIRED));
        }
        self.request(id, |reply| Command::Join {
            player_id: player_id.to_string(),
            reply,
        })
        .await
    }

    /// Places a stone for `player_id` at `(row, col)`.
    #[instrument(skip(self), fields(match_id = %id))]
    pub async fn make_move(&self, id: &MatchId, player_id: &str, row: i64, col: i64) -> Result<Match, MatchError> {
        self.request(id, |reply| Command::Move {
            player_id: player_id.to_string(),
            row,
            col,
            reply,
        })
        .await
    }

    /// Reads the record tagged for `player_id`.
    #[instrument(skip(self), fields(match_id = %id))]
    pub async fn snapshot(&self, id: &MatchId, player_id: &str) -> Result<PlayerView, MatchError> {
        if player_id.is_empty() {
            return Err(MatchError::MissingField(PLAYER_ID_REQUIRED));
        }
        self.request(id, |reply| Command::Snapshot {
            player_id: player_id.to_string(),
            reply,
        })
        .await
    }

    /// Attaches a realtime session for `player_id`.
    ///
    /// The session immediately receives a state message on `outbox`; the
    /// other sessions of the match receive an opponent-connected notice.
    #[instrument(skip(self, outbox), fields(match_id = %id))]
    pub async fn attach(&self, id: &MatchId, player_id: &str, outbox: Outbox) -> Result<SessionHandle, MatchError> {
        for attempt in 1..=DELIVERY_ATTEMPTS {
            let mailbox = self.mailbox(id);
            let (reply, response) = oneshot::channel();
            let command = Command::Attach {
                player_id: player_id.to_string(),
                outbox: outbox.clone(),
                reply,
            };
            if mailbox.send(command).await.is_err() {
                debug!(attempt, "Coordinator retired before attach");
                continue;
            }
            match response.await {
                Ok(Ok((session, color))) => {
                    return Ok(SessionHandle {
                        match_id: id.clone(),
                        session,
                        color,
                        mailbox,
                    });
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => debug!(attempt, "Coordinator retired during attach"),
            }
        }
        Err(MatchError::Unavailable)
    }

    /// Delivers a command built by `make`, re-delivering to a fresh
    /// coordinator if the addressed one retired first.
    async fn request<T>(&self, id: &MatchId, make: impl Fn(Reply<T>) -> Command) -> Result<T, MatchError> {
        for attempt in 1..=DELIVERY_ATTEMPTS {
            let mailbox = self.mailbox(id);
            let (reply, response) = oneshot::channel();
            if mailbox.send(make(reply)).await.is_err() {
                debug!(attempt, "Coordinator retired before delivery");
                continue;
            }
            match response.await {
                Ok(result) => return result,
                Err(_) => debug!(attempt, "Coordinator retired with command queued"),
            }
        }
        warn!(match_id = %id, "Coordinator unreachable");
        Err(MatchError::Unavailable)
    }

    /// Returns the mailbox of the live coordinator for `id`, starting one
    /// if none is running.
    fn mailbox(&self, id: &MatchId) -> mpsc::Sender<Command> {
        let mut slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(id) {
            if !slot.mailbox.is_closed() {
                return slot.mailbox.clone();
            }
        }

        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
        let (mailbox, inbox) = mpsc::channel(MAILBOX_CAPACITY);
        let coordinator = Coordinator::new(
            id.clone(),
            generation,
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.slots),
            self.inner.idle,
        );
        tokio::spawn(coordinator.run(inbox));
        debug!(match_id = %id, generation, "Coordinator spawned");

        slots.insert(
            id.clone(),
            Slot {
                generation,
                mailbox: mailbox.clone(),
            },
        );
        mailbox
    }
}

/// An attached realtime session.
///
/// Holds the coordinator's mailbox directly; a coordinator never retires
/// while sessions are attached.
#[derive(Debug)]
pub struct SessionHandle {
    match_id: MatchId,
    session: SessionId,
    color: Color,
    mailbox: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Match this session belongs to.
    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    /// Seat color of this session.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Submits a move; the outcome arrives on the session's outbox.
    #[instrument(skip(self), fields(match_id = %self.match_id, session = self.session))]
    pub async fn submit_move(&self, row: i64, col: i64) {
        let command = Command::SocketMove {
            session: self.session,
            row,
            col,
        };
        if self.mailbox.send(command).await.is_err() {
            warn!("Coordinator gone, move dropped");
        }
    }

    /// Detaches the session, notifying the other sessions.
    #[instrument(skip(self), fields(match_id = %self.match_id, session = self.session))]
    pub async fn detach(self) {
        let _ = self.mailbox.send(Command::Detach { session: self.session }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use hexlink_core::Phase;
    use hexlink_core::protocol::ServerMessage;

    fn registry(idle: Duration) -> Registry {
        let store: Arc<dyn MatchStore> = Arc::new(MemoryStore::new(Duration::from_secs(3600)));
        Registry::with_limits(store, idle, 8)
    }

    #[tokio::test]
    async fn test_create_does_not_spawn() {
        let registry = registry(Duration::from_secs(60));
        let game = registry.create("alice").await.unwrap();
        assert_eq!(game.phase, Phase::Waiting);
        assert_eq!(registry.live_coordinators(), 0);
    }

    #[tokio::test]
    async fn test_unknown_match_is_not_found() {
        let registry = registry(Duration::from_secs(60));
        let id = MatchId::parse("NOPE00").unwrap();
        assert!(matches!(registry.snapshot(&id, "alice").await, Err(MatchError::NotFound)));
        assert!(matches!(registry.join(&id, "bob").await, Err(MatchError::NotFound)));
    }

    #[tokio::test]
    async fn test_missing_player_id() {
        let registry = registry(Duration::from_secs(60));
        assert!(matches!(
            registry.create("").await,
            Err(MatchError::MissingField(PLAYER_ID_REQUIRED))
        ));
    }

    #[tokio::test]
    async fn test_idle_coordinator_retires_and_respawns() {
        let registry = registry(Duration::from_millis(30));
        let game = registry.create("alice").await.unwrap();
        registry.join(&game.id, "bob").await.unwrap();
        assert_eq!(registry.live_coordinators(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(registry.live_coordinators(), 0);

        // A fresh coordinator reloads the persisted record.
        let view = registry.snapshot(&game.id, "bob").await.unwrap();
        assert_eq!(view.game_state.phase, Phase::Playing);
    }

    #[tokio::test]
    async fn test_attached_session_keeps_coordinator_alive() {
        let registry = registry(Duration::from_millis(30));
        let game = registry.create("alice").await.unwrap();
        let (outbox, mut inbox) = mpsc::unbounded_channel();
        let session = registry.attach(&game.id, "alice", outbox).await.unwrap();
        assert!(matches!(inbox.recv().await, Some(ServerMessage::State(_))));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(registry.live_coordinators(), 1);

        session.detach().await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(registry.live_coordinators(), 0);
    }
}
