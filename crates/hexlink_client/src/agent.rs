//! Client sync agent.
//!
//! One task owns all client-side match state. Callers talk to it through a
//! [`SyncHandle`] and observe it through a `watch` channel carrying a
//! [`LocalView`]. Every update replaces the published view in a single
//! `send_modify`, so observers never see a half-applied snapshot.

use crate::api::ApiClient;
use crate::backoff::Backoff;
use crate::channel::{Link, LinkEvent, Tagged};
use crate::config::ClientConfig;
use crate::error::ClientError;
use derive_getters::Getters;
use derive_more::Display;
use hexlink_core::protocol::{CreateResponse, JoinResponse, ServerMessage};
use hexlink_core::{
    Board, Color, LocalGame, Match, MatchId, Phase, PlayerId, PlayerView, Position, Rejection,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, instrument, warn};

/// Which game the agent is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Mode {
    /// Both colors on this device.
    #[display("local")]
    Local,
    /// One seat of a server-held match.
    #[display("online")]
    Online,
}

/// State of the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Connection {
    /// No channel and none scheduled.
    #[display("disconnected")]
    Disconnected,
    /// An upgrade is in flight.
    #[display("connecting")]
    Connecting,
    /// Moves travel over the channel.
    #[display("open")]
    Open,
    /// Waiting out a backoff delay before the next attempt.
    #[display("reconnecting (attempt {})", attempt)]
    Reconnecting {
        /// Attempts since the channel last opened.
        attempt: u32,
    },
}

/// Everything a UI needs to render the current game.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct LocalView {
    /// Local or online play.
    mode: Mode,
    /// Attached match, online only.
    match_id: Option<MatchId>,
    /// Seat holder id, online only.
    player_id: Option<PlayerId>,
    /// Current board.
    board: Board,
    /// Color to move.
    current_player: Color,
    /// Lifecycle phase. Local games are never `Waiting`.
    phase: Phase,
    /// Winner once won.
    winner: Option<Color>,
    /// Winning chain once won.
    winning_path: Vec<Position>,
    /// Local seat color, online only.
    your_color: Option<Color>,
    /// Whether a move from this device would be accepted now.
    is_your_turn: bool,
    /// Whether the second seat is taken.
    opponent_joined: bool,
    /// Whether the opponent currently has a live channel.
    opponent_connected: bool,
    /// Realtime channel state.
    connection: Connection,
    /// Most recent refusal or transport failure.
    last_error: Option<String>,
}

impl LocalView {
    fn local(game: &LocalGame) -> Self {
        Self {
            mode: Mode::Local,
            match_id: None,
            player_id: None,
            board: game.board().clone(),
            current_player: game.current(),
            phase: if game.is_over() { Phase::Won } else { Phase::Playing },
            winner: game.winner(),
            winning_path: game.winning_path().to_vec(),
            your_color: None,
            is_your_turn: !game.is_over(),
            opponent_joined: true,
            opponent_connected: true,
            connection: Connection::Disconnected,
            last_error: None,
        }
    }

    fn adopt(&mut self, view: &PlayerView) {
        let game = &view.game_state;
        self.board = game.board.clone();
        self.current_player = game.current_player;
        self.phase = game.phase;
        self.winner = game.winner;
        self.winning_path = game.winning_path.clone();
        self.your_color = Some(view.your_color);
        self.is_your_turn = view.is_your_turn;
        self.opponent_joined = game.has_opponent();
    }
}

/// The online match the agent is bound to.
#[derive(Debug, Clone)]
struct Attachment {
    id: MatchId,
    player_id: PlayerId,
    color: Color,
}

enum Command {
    Attach {
        id: MatchId,
        player_id: PlayerId,
        reply: oneshot::Sender<Result<PlayerView, ClientError>>,
    },
    Move {
        row: i64,
        col: i64,
        reply: oneshot::Sender<Result<LocalView, ClientError>>,
    },
    Sync {
        reply: oneshot::Sender<Result<PlayerView, ClientError>>,
    },
    Reset,
    Shutdown,
}

/// Caller side of a running [`SyncAgent`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<LocalView>,
    api: ApiClient,
}

impl SyncHandle {
    /// Latest published view.
    pub fn view(&self) -> LocalView {
        self.view.borrow().clone()
    }

    /// A receiver that wakes on every view change.
    pub fn subscribe(&self) -> watch::Receiver<LocalView> {
        self.view.clone()
    }

    /// REST client shared with the agent.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Creates a match over REST and attaches to it.
    #[instrument(skip(self))]
    pub async fn create(&self, player_id: &str) -> Result<CreateResponse, ClientError> {
        let created = self.api.create(player_id).await?;
        self.attach(created.game_id.clone(), player_id.to_string()).await?;
        Ok(created)
    }

    /// Joins a match over REST and attaches to it.
    #[instrument(skip(self), fields(match_id = %id))]
    pub async fn join(&self, id: &MatchId, player_id: &str) -> Result<JoinResponse, ClientError> {
        let joined = self.api.join(id, player_id).await?;
        self.attach(id.clone(), player_id.to_string()).await?;
        Ok(joined)
    }

    /// Binds the agent to a match already seating `player_id`.
    ///
    /// Reads the authoritative snapshot, switches to online mode and opens
    /// the realtime channel. On failure the current state is kept.
    pub async fn attach(&self, id: MatchId, player_id: PlayerId) -> Result<PlayerView, ClientError> {
        self.request(|reply| Command::Attach { id, player_id, reply }).await
    }

    /// Places a stone for the local player.
    pub async fn make_move(&self, row: i64, col: i64) -> Result<LocalView, ClientError> {
        self.request(|reply| Command::Move { row, col, reply }).await
    }

    /// Re-reads the authoritative snapshot over REST.
    pub async fn sync(&self) -> Result<PlayerView, ClientError> {
        self.request(|reply| Command::Sync { reply }).await
    }

    /// Abandons any online match and starts a fresh same-device game.
    pub async fn reset(&self) -> Result<(), ClientError> {
        self.send(Command::Reset).await
    }

    /// Switches to same-device play.
    pub async fn set_local_mode(&self) -> Result<(), ClientError> {
        self.reset().await
    }

    /// Stops the agent and closes its channel.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).await.map_err(|_| stopped())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, ClientError>>) -> Command,
    ) -> Result<T, ClientError> {
        let (reply, answer) = oneshot::channel();
        self.send(build(reply)).await?;
        answer.await.map_err(|_| stopped())?
    }
}

fn stopped() -> ClientError {
    ClientError::Transport("sync agent stopped".to_string())
}

/// The task behind a [`SyncHandle`].
pub struct SyncAgent {
    api: ApiClient,
    backoff: Backoff,
    view: watch::Sender<LocalView>,
    local: LocalGame,
    attached: Option<Attachment>,
    link: Option<Link>,
    generation: u64,
    events: mpsc::UnboundedSender<Tagged>,
    reconnect_at: Option<Instant>,
    pending_move: Option<oneshot::Sender<Result<LocalView, ClientError>>>,
}

impl SyncAgent {
    /// Spawns an agent in local mode.
    #[instrument(skip(config), fields(server = %config.server_url()))]
    pub fn spawn(config: &ClientConfig) -> SyncHandle {
        let api = ApiClient::new(config.server_url().clone());
        let local = LocalGame::new();
        let (view, view_rx) = watch::channel(LocalView::local(&local));
        let (commands, mailbox) = mpsc::channel(32);
        let (events, inbox) = mpsc::unbounded_channel();

        let agent = Self {
            api: api.clone(),
            backoff: Backoff::new(config.backoff_unit(), *config.backoff_max_units()),
            view,
            local,
            attached: None,
            link: None,
            generation: 0,
            events,
            reconnect_at: None,
            pending_move: None,
        };
        tokio::spawn(agent.run(mailbox, inbox));
        info!("Sync agent started");

        SyncHandle {
            commands,
            view: view_rx,
            api,
        }
    }

    async fn run(mut self, mut mailbox: mpsc::Receiver<Command>, mut inbox: mpsc::UnboundedReceiver<Tagged>) {
        loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                command = mailbox.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command).await,
                },
                Some(tagged) = inbox.recv() => self.on_link_event(tagged),
                _ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.open_channel();
                }
            }
        }
        info!("Sync agent stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Attach { id, player_id, reply } => {
                let _ = reply.send(self.attach(id, player_id).await);
            }
            Command::Move { row, col, reply } => self.make_move(row, col, reply).await,
            Command::Sync { reply } => {
                let _ = reply.send(self.sync().await);
            }
            Command::Reset => self.reset(),
            Command::Shutdown => {}
        }
    }

    #[instrument(skip(self), fields(match_id = %id))]
    async fn attach(&mut self, id: MatchId, player_id: PlayerId) -> Result<PlayerView, ClientError> {
        let view = match self.api.snapshot(&id, &player_id).await {
            Ok(view) => view,
            Err(e) => {
                warn!(error = %e, "Attach failed");
                self.record_error(&e);
                return Err(e);
            }
        };

        self.abandon();
        info!(color = %view.your_color, "Attached to online match");
        self.attached = Some(Attachment {
            id: id.clone(),
            player_id: player_id.clone(),
            color: view.your_color,
        });
        self.view.send_modify(|v| {
            v.mode = Mode::Online;
            v.match_id = Some(id);
            v.player_id = Some(player_id);
            v.opponent_connected = false;
            v.last_error = None;
            v.adopt(&view);
        });
        self.open_channel();
        Ok(view)
    }

    async fn sync(&mut self) -> Result<PlayerView, ClientError> {
        let Some(attached) = self.attached.clone() else {
            return Err(ClientError::NotAttached);
        };
        let view = self.api.snapshot(&attached.id, &attached.player_id).await.inspect_err(|e| {
            warn!(error = %e, "Sync failed");
            self.record_error(e);
        })?;
        self.view.send_modify(|v| v.adopt(&view));
        Ok(view)
    }

    async fn make_move(&mut self, row: i64, col: i64, reply: oneshot::Sender<Result<LocalView, ClientError>>) {
        if self.attached.is_none() {
            let _ = reply.send(self.local_move(row, col));
            return;
        }

        if let Err(rejection) = self.precheck(row, col) {
            debug!(%rejection, row, col, "Move rejected locally");
            let _ = reply.send(Err(ClientError::LocalRejected(rejection)));
            return;
        }

        if let Some(link) = self.link.as_ref().filter(|link| link.is_open()) {
            match link.send_move(row, col) {
                Ok(()) => {
                    debug!(row, col, "Move sent over channel");
                    self.pending_move = Some(reply);
                    return;
                }
                Err(e) => debug!(error = %e, "Channel send failed, using request path"),
            }
        }

        let _ = reply.send(self.rest_move(row, col).await);
    }

    /// Refuses moves the server would certainly reject.
    fn precheck(&self, row: i64, col: i64) -> Result<(), Rejection> {
        let view = self.view.borrow();
        if !view.is_your_turn || self.pending_move.is_some() {
            return Err(Rejection::NotYourTurn);
        }
        if view.phase != Phase::Playing {
            return Err(Rejection::NotPlaying);
        }
        let pos = Position::from_signed(row, col).ok_or(Rejection::OutOfBounds)?;
        if !view.board.is_empty(pos) {
            return Err(Rejection::Occupied);
        }
        Ok(())
    }

    async fn rest_move(&mut self, row: i64, col: i64) -> Result<LocalView, ClientError> {
        let Some(attached) = self.attached.clone() else {
            return Err(ClientError::NotAttached);
        };
        match self.api.make_move(&attached.id, &attached.player_id, row, col).await {
            Ok(game) => {
                debug!(row, col, "Move applied over request path");
                Ok(self.adopt_match(&game, attached.color))
            }
            Err(e) => {
                warn!(error = %e, "Move rejected");
                self.record_error(&e);
                Err(e)
            }
        }
    }

    fn local_move(&mut self, row: i64, col: i64) -> Result<LocalView, ClientError> {
        let pos = Position::from_signed(row, col).ok_or(ClientError::LocalRejected(Rejection::OutOfBounds))?;
        self.local.play(pos)?;
        let next = LocalView::local(&self.local);
        self.view.send_replace(next.clone());
        Ok(next)
    }

    fn adopt_match(&mut self, game: &Match, color: Color) -> LocalView {
        let view = game.view_as(color);
        self.view.send_modify(|v| {
            v.adopt(&view);
            v.last_error = None;
        });
        self.view.borrow().clone()
    }

    fn record_error(&self, err: &ClientError) {
        let message = err.to_string();
        self.view.send_modify(|v| v.last_error = Some(message));
    }

    /// Opens the realtime channel unless one is open or opening.
    fn open_channel(&mut self) {
        if self.link.is_some() {
            return;
        }
        let Some(attached) = self.attached.as_ref() else {
            return;
        };
        let url = match self.api.ws_url(&attached.id, &attached.player_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Cannot build channel url");
                self.record_error(&e);
                return;
            }
        };

        self.generation += 1;
        debug!(generation = self.generation, "Opening channel");
        self.link = Some(Link::spawn(url, self.generation, self.events.clone()));
        if self.backoff.attempts() == 0 {
            self.set_connection(Connection::Connecting);
        }
    }

    fn on_link_event(&mut self, tagged: Tagged) {
        let current = self.link.as_ref().map(Link::generation);
        if current != Some(tagged.generation) {
            debug!(generation = tagged.generation, "Dropping event from stale link");
            return;
        }

        match tagged.event {
            LinkEvent::Opened(sender) => {
                if let Some(link) = self.link.as_mut() {
                    link.opened(sender);
                }
                self.backoff.reset();
                self.set_connection(Connection::Open);
            }
            LinkEvent::Message(message) => self.on_message(message),
            LinkEvent::Closed => self.on_link_down(None),
            LinkEvent::Failed(e) => self.on_link_down(Some(e)),
        }
    }

    fn on_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::State(view) => {
                if let Some(attached) = self.attached.as_mut() {
                    attached.color = view.your_color;
                }
                self.view.send_modify(|v| {
                    v.adopt(&view);
                    v.last_error = None;
                });
                if let Some(reply) = self.pending_move.take() {
                    let _ = reply.send(Ok(self.view.borrow().clone()));
                }
            }
            ServerMessage::Error { message } => {
                warn!(%message, "Server rejected request");
                self.view.send_modify(|v| v.last_error = Some(message.clone()));
                if let Some(reply) = self.pending_move.take() {
                    let _ = reply.send(Err(ClientError::Rejected { status: None, message }));
                }
            }
            ServerMessage::OpponentConnected => self.view.send_modify(|v| v.opponent_connected = true),
            ServerMessage::OpponentDisconnected => self.view.send_modify(|v| v.opponent_connected = false),
        }
    }

    fn on_link_down(&mut self, failure: Option<ClientError>) {
        self.link = None;
        if let Some(e) = &failure {
            debug!(error = %e, "Channel attempt failed");
        }
        if let Some(reply) = self.pending_move.take() {
            let _ = reply.send(Err(ClientError::Transport(
                "channel closed before the move was acknowledged".to_string(),
            )));
        }

        let finished = self.view.borrow().phase == Phase::Won;
        if self.attached.is_none() || finished {
            self.set_connection(Connection::Disconnected);
            return;
        }
        if let Some(e) = failure.filter(ClientError::is_stale_link) {
            warn!(error = %e, "Channel refused for this seat, not reconnecting");
            self.record_error(&e);
            self.set_connection(Connection::Disconnected);
            return;
        }

        let delay = self.backoff.next_delay();
        let attempt = self.backoff.attempts();
        info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
        self.reconnect_at = Some(Instant::now() + delay);
        self.view.send_modify(|v| {
            v.connection = Connection::Reconnecting { attempt };
            v.opponent_connected = false;
        });
    }

    fn set_connection(&self, connection: Connection) {
        self.view.send_if_modified(|v| {
            let changed = v.connection != connection;
            v.connection = connection;
            changed
        });
    }

    /// Drops the channel, any scheduled reconnect and any in-flight move.
    fn abandon(&mut self) {
        self.link = None;
        self.reconnect_at = None;
        self.attached = None;
        self.backoff.reset();
        if let Some(reply) = self.pending_move.take() {
            let _ = reply.send(Err(ClientError::NotAttached));
        }
    }

    fn reset(&mut self) {
        self.abandon();
        self.local = LocalGame::new();
        info!("Reset to a fresh local game");
        self.view.send_replace(LocalView::local(&self.local));
    }
}
