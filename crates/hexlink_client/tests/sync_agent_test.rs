//! Tests for the sync agent against live servers.

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{MethodRouter, get};
use hexlink_client::{ApiClient, ClientConfig, ClientError, Connection, LocalView, Mode, SyncAgent, SyncHandle};
use hexlink_core::{Cell, Color, ErrorKind, MatchId, MoveError, Phase, Position, Rejection};
use hexlink_server::{AppState, MemoryStore, Registry, Server, ServerConfig, StoreConfig, router};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant as StdInstant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

async fn spawn_server() -> SocketAddr {
    let server = Server::bind(ServerConfig::default().with_port(0))
        .await
        .expect("bind failed");
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

/// Serves the REST routes with the realtime upgrade replaced by `channel`.
async fn spawn_with_channel_route(channel: MethodRouter) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig::default().with_port(addr.port());
    let store = Arc::new(MemoryStore::new(config.match_ttl()));
    let state = AppState::new(Registry::new(store, &config), config.share_origin());

    let app = Router::new()
        .route("/api/games/{id}/ws", channel)
        .fallback_service(router(state));
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

/// Serves the REST routes but refuses every realtime upgrade.
async fn spawn_rest_only_server() -> SocketAddr {
    spawn_with_channel_route(get(|| async { StatusCode::SERVICE_UNAVAILABLE })).await
}

/// Refuses every upgrade with 503 and records when each attempt arrived.
async fn spawn_refusing_server() -> (SocketAddr, Arc<Mutex<Vec<StdInstant>>>) {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let recorded = attempts.clone();
    let addr = spawn_with_channel_route(get(move || {
        let recorded = recorded.clone();
        async move {
            recorded.lock().unwrap().push(StdInstant::now());
            StatusCode::SERVICE_UNAVAILABLE
        }
    }))
    .await;
    (addr, attempts)
}

/// A server on its own runtime, so stopping it drops every open socket.
struct ServerThread {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl ServerThread {
    fn start(config: ServerConfig) -> Self {
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let (stop, stopped) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let server = Server::bind(config).await.expect("bind failed");
                addr_tx.send(server.local_addr().unwrap()).unwrap();
                tokio::select! {
                    _ = server.run() => {}
                    _ = stopped => {}
                }
            });
        });
        let addr = addr_rx.recv().unwrap();
        Self {
            addr,
            stop: Some(stop),
            thread: Some(thread),
        }
    }

    fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

fn agent_for(addr: SocketAddr) -> SyncHandle {
    agent_with_unit(addr, 20)
}

fn agent_with_unit(addr: SocketAddr, unit_ms: u64) -> SyncHandle {
    let config = ClientConfig::default()
        .with_server_url(format!("http://{addr}"))
        .with_backoff_unit_ms(unit_ms);
    SyncAgent::spawn(&config)
}

async fn wait_for(handle: &SyncHandle, mut ready: impl FnMut(&LocalView) -> bool) -> LocalView {
    let mut rx = handle.subscribe();
    let guard = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|view| ready(view)))
        .await
        .expect("timed out waiting for view")
        .expect("agent stopped");
    (*guard).clone()
}

fn stone_at(view: &LocalView, row: usize, col: usize) -> Option<Color> {
    view.board().get(Position::new(row, col)).and_then(Cell::color)
}

/// Creates through one agent and joins through the other; returns (blue, red).
async fn started_pair(addr: SocketAddr) -> (SyncHandle, SyncHandle) {
    let first = agent_for(addr);
    let second = agent_for(addr);
    let created = first.create("p1").await.unwrap();
    second.join(&created.game_id, "p2").await.unwrap();

    for agent in [&first, &second] {
        wait_for(agent, |v| *v.connection() == Connection::Open && *v.phase() == Phase::Playing).await;
    }

    if created.player_color == Color::Blue {
        (first, second)
    } else {
        (second, first)
    }
}

#[tokio::test]
async fn test_local_mode_alternates_and_resets() {
    let agent = SyncAgent::spawn(&ClientConfig::default());
    assert_eq!(*agent.view().mode(), Mode::Local);

    let view = agent.make_move(0, 0).await.unwrap();
    assert_eq!(stone_at(&view, 0, 0), Some(Color::Blue));
    assert_eq!(*view.current_player(), Color::Red);

    let err = agent.make_move(0, 0).await.unwrap_err();
    assert_eq!(err, ClientError::LocalMove(MoveError::Occupied(Position::new(0, 0))));

    agent.reset().await.unwrap();
    let view = wait_for(&agent, |v| v.board().is_blank()).await;
    assert_eq!(*view.current_player(), Color::Blue);
}

#[tokio::test]
async fn test_moves_travel_over_channel() {
    let addr = spawn_server().await;
    let (blue, red) = started_pair(addr).await;

    let after = blue.make_move(5, 5).await.unwrap();
    assert_eq!(stone_at(&after, 5, 5), Some(Color::Blue));
    assert!(!*after.is_your_turn());

    let seen = wait_for(&red, |v| stone_at(v, 5, 5) == Some(Color::Blue)).await;
    assert!(*seen.is_your_turn());
    assert_eq!(*seen.phase(), Phase::Playing);
    assert_eq!(*seen.your_color(), Some(Color::Red));
}

#[tokio::test]
async fn test_peer_presence_is_tracked() {
    let addr = spawn_server().await;
    let creator = agent_for(addr);
    let joiner = agent_for(addr);
    let created = creator.create("p1").await.unwrap();
    wait_for(&creator, |v| *v.connection() == Connection::Open).await;
    assert!(!*creator.view().opponent_connected());

    joiner.join(&created.game_id, "p2").await.unwrap();
    let seen = wait_for(&creator, |v| *v.opponent_connected()).await;
    assert!(*seen.opponent_joined());

    joiner.shutdown().await.unwrap();
    wait_for(&creator, |v| !*v.opponent_connected()).await;
}

#[tokio::test]
async fn test_illegal_moves_rejected_locally() {
    let addr = spawn_server().await;
    let (blue, red) = started_pair(addr).await;

    let err = red.make_move(0, 0).await.unwrap_err();
    assert_eq!(err, ClientError::LocalRejected(Rejection::NotYourTurn));

    blue.make_move(3, 3).await.unwrap();
    wait_for(&red, |v| *v.is_your_turn()).await;

    let before = red.view();
    assert_eq!(
        red.make_move(3, 3).await.unwrap_err(),
        ClientError::LocalRejected(Rejection::Occupied)
    );
    assert_eq!(
        red.make_move(11, 0).await.unwrap_err(),
        ClientError::LocalRejected(Rejection::OutOfBounds)
    );
    assert_eq!(red.view().board(), before.board());
}

#[tokio::test]
async fn test_waiting_match_refuses_moves() {
    let addr = spawn_server().await;
    let agent = agent_for(addr);
    agent.create("p1").await.unwrap();

    let view = agent.view();
    assert_eq!(*view.phase(), Phase::Waiting);
    assert!(!*view.opponent_joined());

    let err = agent.make_move(0, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert!(agent.view().board().is_blank());
}

#[tokio::test]
async fn test_failed_attach_keeps_state() {
    let addr = spawn_server().await;
    let agent = agent_for(addr);

    let err = agent
        .attach(MatchId::parse("ZZZZZZ").unwrap(), "p1".to_string())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(*agent.view().mode(), Mode::Local);
    assert_eq!(agent.sync().await.unwrap_err(), ClientError::NotAttached);
}

#[tokio::test]
async fn test_request_path_used_without_channel() {
    let addr = spawn_rest_only_server().await;
    let api = ApiClient::new(format!("http://{addr}"));
    let created = api.create("p1").await.unwrap();
    api.join(&created.game_id, "p2").await.unwrap();

    let (mover, other) = if created.player_color == Color::Blue {
        ("p1", "p2")
    } else {
        ("p2", "p1")
    };
    let agent = agent_for(addr);
    agent.attach(created.game_id.clone(), mover.to_string()).await.unwrap();
    assert_ne!(*agent.view().connection(), Connection::Open);

    let after = agent.make_move(0, 0).await.unwrap();
    assert_eq!(stone_at(&after, 0, 0), Some(Color::Blue));
    assert!(!*after.is_your_turn());

    // Without a channel the opponent's move only arrives through a sync.
    api.make_move(&created.game_id, other, 1, 1).await.unwrap();
    assert_eq!(
        agent.make_move(2, 2).await.unwrap_err(),
        ClientError::LocalRejected(Rejection::NotYourTurn)
    );

    let synced = agent.sync().await.unwrap();
    assert!(synced.is_your_turn);
    let view = agent.view();
    assert_eq!(stone_at(&view, 1, 1), Some(Color::Red));
    assert!(*view.is_your_turn());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconnects_after_server_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("matches.db").to_string_lossy().to_string();
    let config = ServerConfig::default()
        .with_port(0)
        .with_store(StoreConfig::Sqlite { path: db });

    let first = ServerThread::start(config.clone());
    let addr = first.addr;
    let api = ApiClient::new(format!("http://{addr}"));
    let agent = agent_for(addr);

    let created = agent.create("p1").await.unwrap();
    api.join(&created.game_id, "p2").await.unwrap();
    wait_for(&agent, |v| *v.connection() == Connection::Open && *v.phase() == Phase::Playing).await;

    first.stop();
    wait_for(&agent, |v| matches!(v.connection(), Connection::Reconnecting { .. })).await;

    let second = ServerThread::start(config.with_port(addr.port()));
    wait_for(&agent, |v| *v.connection() == Connection::Open).await;

    // The restored channel carries fresh state in both directions.
    if created.player_color == Color::Blue {
        let after = agent.make_move(4, 4).await.unwrap();
        assert_eq!(stone_at(&after, 4, 4), Some(Color::Blue));
    } else {
        api.make_move(&created.game_id, "p2", 4, 4).await.unwrap();
        let seen = wait_for(&agent, |v| stone_at(v, 4, 4) == Some(Color::Blue)).await;
        assert!(*seen.is_your_turn());
    }

    agent.shutdown().await.unwrap();
    second.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconnect_reconciles_changes_made_during_outage() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("matches.db").to_string_lossy().to_string();
    let config = ServerConfig::default()
        .with_port(0)
        .with_store(StoreConfig::Sqlite { path: db });

    let first = ServerThread::start(config.clone());
    let addr = first.addr;
    let api = ApiClient::new(format!("http://{addr}"));
    let agent = agent_with_unit(addr, 500);

    let created = agent.create("p1").await.unwrap();
    api.join(&created.game_id, "p2").await.unwrap();
    wait_for(&agent, |v| *v.connection() == Connection::Open && *v.phase() == Phase::Playing).await;
    if created.player_color == Color::Blue {
        agent.make_move(4, 4).await.unwrap();
    }

    first.stop();
    wait_for(&agent, |v| matches!(v.connection(), Connection::Reconnecting { .. })).await;

    // The other seat moves while this agent is still waiting out its backoff.
    let second = ServerThread::start(config.with_port(addr.port()));
    api.make_move(&created.game_id, "p2", 6, 6).await.unwrap();

    let view = wait_for(&agent, |v| *v.connection() == Connection::Open && stone_at(v, 6, 6).is_some()).await;
    let server = api.snapshot(&created.game_id, "p1").await.unwrap();
    assert_eq!(*view.board(), server.game_state.board);
    assert_eq!(*view.current_player(), server.game_state.current_player);
    assert_eq!(*view.phase(), server.game_state.phase);
    assert_eq!(*view.is_your_turn(), server.is_your_turn);
    assert!(*view.is_your_turn());

    agent.shutdown().await.unwrap();
    second.stop();
}

#[tokio::test]
async fn test_reconnect_attempts_follow_backoff_schedule() {
    let (addr, attempts) = spawn_refusing_server().await;
    let api = ApiClient::new(format!("http://{addr}"));
    let created = api.create("p1").await.unwrap();

    let unit = Duration::from_millis(100);
    let agent = agent_with_unit(addr, 100);
    agent.attach(created.game_id.clone(), "p1".to_string()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        while attempts.lock().unwrap().len() < 6 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("too few reconnect attempts");
    agent.shutdown().await.unwrap();

    let times = attempts.lock().unwrap().clone();
    for (gap, units) in times.windows(2).zip([1u32, 2, 4, 5, 5]) {
        let elapsed = gap[1] - gap[0];
        let expected = unit * units;
        assert!(elapsed >= expected, "gap {elapsed:?} shorter than {expected:?}");
        assert!(
            elapsed < expected + Duration::from_millis(300),
            "gap {elapsed:?} far beyond {expected:?}"
        );
    }
}

#[tokio::test]
async fn test_refused_channel_for_unknown_seat_stops_reconnecting() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counted = attempts.clone();
    let addr = spawn_with_channel_route(get(move || {
        let counted = counted.clone();
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            (StatusCode::NOT_FOUND, "Game not found")
        }
    }))
    .await;
    let api = ApiClient::new(format!("http://{addr}"));
    let created = api.create("p1").await.unwrap();

    let agent = agent_for(addr);
    agent.attach(created.game_id.clone(), "p1".to_string()).await.unwrap();
    let view = wait_for(&agent, |v| *v.connection() == Connection::Disconnected).await;
    assert_eq!(view.last_error().as_deref(), Some("Game not found"));

    // Ten backoff units pass without another attempt.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(*agent.view().connection(), Connection::Disconnected);
}
