//! The per-match coordinator task.
//!
//! One task owns one match record. Commands arrive on its mailbox and are
//! handled strictly one at a time; the task is the only writer of its
//! record in the store.

use super::Slots;
use crate::error::MatchError;
use crate::store::MatchStore;
use chrono::Utc;
use hexlink_core::invariants::{InvariantSet, MatchInvariants};
use hexlink_core::protocol::ServerMessage;
use hexlink_core::{Color, Match, MatchId, PlayerId, PlayerView};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

/// Identifies one attached realtime session within a coordinator.
pub type SessionId = u64;

/// Reply channel for a command.
pub(crate) type Reply<T> = oneshot::Sender<Result<T, MatchError>>;

/// Outbound queue of one realtime session.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Mailbox message for a coordinator.
#[derive(Debug)]
pub(crate) enum Command {
    Join {
        player_id: PlayerId,
        reply: Reply<(Color, Match)>,
    },
    Move {
        player_id: PlayerId,
        row: i64,
        col: i64,
        reply: Reply<Match>,
    },
    Snapshot {
        player_id: PlayerId,
        reply: Reply<PlayerView>,
    },
    Attach {
        player_id: PlayerId,
        outbox: Outbox,
        reply: Reply<(SessionId, Color)>,
    },
    SocketMove {
        session: SessionId,
        row: i64,
        col: i64,
    },
    Detach {
        session: SessionId,
    },
}

#[derive(Debug)]
struct Session {
    player_id: PlayerId,
    color: Color,
    outbox: Outbox,
}

pub(crate) struct Coordinator {
    id: MatchId,
    generation: u64,
    store: Arc<dyn MatchStore>,
    slots: Slots,
    idle: Duration,
    sessions: HashMap<SessionId, Session>,
    next_session: SessionId,
}

impl Coordinator {
    pub(crate) fn new(id: MatchId, generation: u64, store: Arc<dyn MatchStore>, slots: Slots, idle: Duration) -> Self {
        Self {
            id,
            generation,
            store,
            slots,
            idle,
            sessions: HashMap::new(),
            next_session: 0,
        }
    }

    /// Loads the record, then serves the mailbox until retirement.
    #[instrument(name = "coordinator", skip_all, fields(match_id = %self.id, generation = self.generation))]
    pub(crate) async fn run(mut self, mut mailbox: mpsc::Receiver<Command>) {
        let mut record = match self.store.get(&self.id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No record, retiring");
                self.retire(&mut mailbox, Some(MatchError::NotFound));
                return;
            }
            Err(e) => {
                error!(error = %e, "Failed to load record");
                self.retire(&mut mailbox, Some(MatchError::Store(e)));
                return;
            }
        };
        info!(phase = %record.phase, "Coordinator started");

        loop {
            self.prune_closed_sessions();
            let idle = self.sessions.is_empty();
            tokio::select! {
                command = mailbox.recv() => match command {
                    Some(command) => self.handle(&mut record, command).await,
                    None => break,
                },
                _ = tokio::time::sleep(self.idle), if idle => {
                    info!("Coordinator idle, retiring");
                    self.retire(&mut mailbox, None);
                    return;
                }
            }
        }
    }

    /// Removes this coordinator from the registry and closes the mailbox.
    ///
    /// Queued commands expecting a reply receive `answer`. With no answer
    /// they are dropped unanswered and the caller re-delivers them to a
    /// fresh coordinator.
    fn retire(&self, mailbox: &mut mpsc::Receiver<Command>, answer: Option<MatchError>) {
        {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            if slots.get(&self.id).is_some_and(|slot| slot.generation == self.generation) {
                slots.remove(&self.id);
            }
        }
        mailbox.close();

        while let Ok(command) = mailbox.try_recv() {
            let Some(err) = answer.clone() else {
                continue;
            };
            match command {
                Command::Join { reply, .. } => {
                    let _ = reply.send(Err(err));
                }
                Command::Move { reply, .. } => {
                    let _ = reply.send(Err(err));
                }
                Command::Snapshot { reply, .. } => {
                    let _ = reply.send(Err(err));
                }
                Command::Attach { reply, .. } => {
                    let _ = reply.send(Err(err));
                }
                Command::SocketMove { .. } | Command::Detach { .. } => {}
            }
        }
    }

    async fn handle(&mut self, record: &mut Match, command: Command) {
        match command {
            Command::Join { player_id, reply } => {
                let result = self.join(record, &player_id).await;
                let _ = reply.send(result);
            }
            Command::Move {
                player_id,
                row,
                col,
                reply,
            } => {
                let result = self.apply_move(record, &player_id, row, col).await;
                let _ = reply.send(result);
            }
            Command::Snapshot { player_id, reply } => {
                let _ = reply.send(record.view_for(&player_id).map_err(MatchError::from));
            }
            Command::Attach {
                player_id,
                outbox,
                reply,
            } => {
                let _ = reply.send(self.attach(record, player_id, outbox));
            }
            Command::SocketMove { session, row, col } => self.socket_move(record, session, row, col).await,
            Command::Detach { session } => self.detach(session),
        }
    }

    #[instrument(skip(self, record), fields(match_id = %self.id))]
    async fn join(&mut self, record: &mut Match, player_id: &str) -> Result<(Color, Match), MatchError> {
        let mut next = record.clone();
        let color = next.join(player_id, Utc::now()).inspect_err(|rejection| {
            warn!(player_id, %rejection, "Join rejected");
        })?;
        self.commit(record, next).await?;
        info!(player_id, %color, "Player joined");
        Ok((color, record.clone()))
    }

    #[instrument(skip(self, record), fields(match_id = %self.id))]
    async fn apply_move(&mut self, record: &mut Match, player_id: &str, row: i64, col: i64) -> Result<Match, MatchError> {
        let mut next = record.clone();
        let color = next.play(player_id, row, col, Utc::now()).inspect_err(|rejection| {
            warn!(player_id, %rejection, "Move rejected");
        })?;
        self.commit(record, next).await?;
        if let Some(winner) = record.winner {
            info!(%winner, path = record.winning_path.len(), "Match won");
        } else {
            debug!(%color, next = %record.current_player, "Move committed");
        }
        Ok(record.clone())
    }

    /// Persists `next`, then adopts it and fans it out.
    ///
    /// On a store failure the in-memory record is left as it was.
    async fn commit(&mut self, record: &mut Match, next: Match) -> Result<(), MatchError> {
        debug_assert!(
            MatchInvariants::check_all(&next).is_ok(),
            "match invariants violated: {:?}",
            MatchInvariants::check_all(&next)
        );
        if let Err(e) = self.store.put(&next).await {
            error!(error = %e, "Failed to persist record");
            return Err(MatchError::Store(e));
        }
        *record = next;
        self.broadcast_state(record);
        Ok(())
    }

    fn attach(&mut self, record: &Match, player_id: PlayerId, outbox: Outbox) -> Result<(SessionId, Color), MatchError> {
        let color = record.seat_of(&player_id).ok_or(MatchError::NotAPlayer)?;
        let session = self.next_session;
        self.next_session += 1;

        self.broadcast(&ServerMessage::OpponentConnected);
        let _ = outbox.send(ServerMessage::State(record.view_as(color)));
        info!(player_id = %player_id, %color, session, "Session attached");
        self.sessions.insert(
            session,
            Session {
                player_id,
                color,
                outbox,
            },
        );
        Ok((session, color))
    }

    async fn socket_move(&mut self, record: &mut Match, session: SessionId, row: i64, col: i64) {
        let Some(player_id) = self.sessions.get(&session).map(|s| s.player_id.clone()) else {
            warn!(session, "Move from unknown session");
            return;
        };
        if let Err(e) = self.apply_move(record, &player_id, row, col).await {
            if let Some(target) = self.sessions.get(&session) {
                let _ = target.outbox.send(ServerMessage::Error { message: e.to_string() });
            }
        }
    }

    fn detach(&mut self, session: SessionId) {
        if let Some(gone) = self.sessions.remove(&session) {
            info!(player_id = %gone.player_id, session, "Session detached");
            self.broadcast(&ServerMessage::OpponentDisconnected);
        }
    }

    fn broadcast_state(&self, record: &Match) {
        for session in self.sessions.values() {
            let _ = session.outbox.send(ServerMessage::State(record.view_as(session.color)));
        }
    }

    fn broadcast(&self, message: &ServerMessage) {
        for session in self.sessions.values() {
            let _ = session.outbox.send(message.clone());
        }
    }

    /// Drops sessions whose socket task is gone without detaching.
    fn prune_closed_sessions(&mut self) {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.outbox.is_closed());
        if self.sessions.len() < before {
            debug!(pruned = before - self.sessions.len(), "Pruned closed sessions");
            self.broadcast(&ServerMessage::OpponentDisconnected);
        }
    }
}
