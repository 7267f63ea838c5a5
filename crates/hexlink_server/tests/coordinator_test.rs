//! Tests for match coordination through the registry.

use async_trait::async_trait;
use hexlink_core::invariants::{InvariantSet, MatchInvariants};
use hexlink_core::{BOARD_SIZE, Cell, Color, ErrorKind, Match, MatchId, Phase, Position};
use hexlink_server::{MatchError, MatchStore, MemoryStore, Registry, StoreError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn memory_registry() -> Registry {
    let store: Arc<dyn MatchStore> = Arc::new(MemoryStore::new(Duration::from_secs(3600)));
    Registry::with_limits(store, Duration::from_secs(60), 8)
}

/// Creates a playing match and returns it with the (blue, red) player ids.
async fn started(registry: &Registry) -> (Match, &'static str, &'static str) {
    let game = registry.create("alice").await.expect("create failed");
    let (bob_color, game) = registry.join(&game.id, "bob").await.expect("join failed");
    if bob_color == Color::Blue {
        (game, "bob", "alice")
    } else {
        (game, "alice", "bob")
    }
}

#[tokio::test]
async fn test_create_join_first_move() {
    let registry = memory_registry();
    let (game, blue, _red) = started(&registry).await;
    assert_eq!(game.phase, Phase::Playing);
    assert_ne!(game.player1_color, game.player2_color);

    let after = registry.make_move(&game.id, blue, 0, 0).await.unwrap();
    assert_eq!(after.board.get(Position::new(0, 0)), Some(Cell::Stone(Color::Blue)));
    assert_eq!(after.current_player, Color::Red);
}

#[tokio::test]
async fn test_join_full_match_leaves_it_unchanged() {
    let registry = memory_registry();
    let (game, _, _) = started(&registry).await;
    let before = registry.snapshot(&game.id, "alice").await.unwrap();

    let err = registry.join(&game.id, "carol").await.unwrap_err();
    assert!(matches!(err, MatchError::AlreadyFull));
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    let err = registry.join(&game.id, "alice").await.unwrap_err();
    assert!(matches!(err, MatchError::AlreadyJoined));

    assert_eq!(registry.snapshot(&game.id, "alice").await.unwrap(), before);
}

#[tokio::test]
async fn test_snapshot_is_idempotent_and_seat_scoped() {
    let registry = memory_registry();
    let (game, blue, red) = started(&registry).await;

    let first = registry.snapshot(&game.id, blue).await.unwrap();
    let second = registry.snapshot(&game.id, blue).await.unwrap();
    assert_eq!(first, second);
    assert!(first.is_your_turn);
    assert!(!registry.snapshot(&game.id, red).await.unwrap().is_your_turn);

    let err = registry.snapshot(&game.id, "mallory").await.unwrap_err();
    assert!(matches!(err, MatchError::NotAPlayer));
}

#[tokio::test]
async fn test_rejected_moves_leave_snapshot_unchanged() {
    let registry = memory_registry();
    let (game, blue, red) = started(&registry).await;
    registry.make_move(&game.id, blue, 2, 2).await.unwrap();
    let before = serde_json::to_string(&registry.snapshot(&game.id, red).await.unwrap()).unwrap();

    for (player, row, col) in [(red, 2, 2), (blue, 3, 3), (red, -1, 4), (red, 4, 11), ("mallory", 5, 5)] {
        assert!(registry.make_move(&game.id, player, row, col).await.is_err());
    }

    let after = serde_json::to_string(&registry.snapshot(&game.id, red).await.unwrap()).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_diagonal_chain_wins() {
    let registry = memory_registry();
    let (game, blue, red) = started(&registry).await;

    let mut last = game.clone();
    for row in 0..BOARD_SIZE {
        let col = (BOARD_SIZE - 1 - row) as i64;
        last = registry.make_move(&game.id, blue, row as i64, col).await.unwrap();
        if last.phase == Phase::Won {
            break;
        }
        registry.make_move(&game.id, red, row as i64, 0).await.unwrap();
    }

    assert_eq!(last.phase, Phase::Won);
    assert_eq!(last.winner, Some(Color::Blue));
    assert!(!last.winning_path.is_empty());
    assert!(MatchInvariants::check_all(&last).is_ok());

    let before = serde_json::to_string(&registry.snapshot(&game.id, blue).await.unwrap()).unwrap();

    let err = registry.make_move(&game.id, blue, 5, 5).await.unwrap_err();
    assert!(matches!(err, MatchError::NotPlaying));
    let err = registry.make_move(&game.id, red, 5, 5).await.unwrap_err();
    assert!(matches!(err, MatchError::NotYourTurn));

    let after = serde_json::to_string(&registry.snapshot(&game.id, blue).await.unwrap()).unwrap();
    assert_eq!(before, after);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_moves_commit_exactly_once() {
    let registry = memory_registry();

    for _ in 0..25 {
        let (game, blue, red) = started(&registry).await;
        let (a, b) = tokio::join!(
            registry.make_move(&game.id, blue, 5, 5),
            registry.make_move(&game.id, red, 5, 5)
        );

        let accepted = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(accepted, 1, "exactly one move commits");
        let rejected = if a.is_ok() { b.unwrap_err() } else { a.unwrap_err() };
        assert_eq!(rejected.kind(), ErrorKind::StateConflict);

        let view = registry.snapshot(&game.id, blue).await.unwrap();
        assert_eq!(view.game_state.board.stone_count(Color::Blue), 1);
        assert_eq!(view.game_state.board.stone_count(Color::Red), 0);
        assert_eq!(view.game_state.current_player, Color::Red);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_player_double_submit_commits_once() {
    let registry = memory_registry();
    let (game, blue, _red) = started(&registry).await;

    let (a, b) = tokio::join!(
        registry.make_move(&game.id, blue, 1, 1),
        registry.make_move(&game.id, blue, 1, 2)
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let err = a.err().or(b.err()).unwrap();
    assert!(matches!(err, MatchError::NotYourTurn));
}

/// Memory store whose writes can be made to fail.
struct FlakyStore {
    inner: MemoryStore,
    fail_puts: AtomicBool,
}

#[async_trait]
impl MatchStore for FlakyStore {
    async fn get(&self, id: &MatchId) -> Result<Option<Match>, StoreError> {
        self.inner.get(id).await
    }

    async fn put(&self, record: &Match) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::new("disk full"));
        }
        self.inner.put(record).await
    }

    async fn insert_new(&self, record: &Match) -> Result<bool, StoreError> {
        self.inner.insert_new(record).await
    }
}

#[tokio::test]
async fn test_failed_write_is_not_applied() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(Duration::from_secs(3600)),
        fail_puts: AtomicBool::new(false),
    });
    let registry = Registry::with_limits(store.clone(), Duration::from_secs(60), 8);
    let (game, blue, _red) = started(&registry).await;

    store.fail_puts.store(true, Ordering::SeqCst);
    let err = registry.make_move(&game.id, blue, 0, 0).await.unwrap_err();
    assert!(matches!(err, MatchError::Store(_)));
    assert_eq!(err.kind(), ErrorKind::Transport);

    store.fail_puts.store(false, Ordering::SeqCst);
    let view = registry.snapshot(&game.id, blue).await.unwrap();
    assert!(view.game_state.board.is_blank());
    assert!(view.is_your_turn);

    // The same move goes through once the store recovers.
    registry.make_move(&game.id, blue, 0, 0).await.unwrap();
}

/// Store that reports every id as taken.
struct FullStore;

#[async_trait]
impl MatchStore for FullStore {
    async fn get(&self, _id: &MatchId) -> Result<Option<Match>, StoreError> {
        Ok(None)
    }

    async fn put(&self, _record: &Match) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_new(&self, _record: &Match) -> Result<bool, StoreError> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_id_exhaustion() {
    let registry = Registry::with_limits(Arc::new(FullStore), Duration::from_secs(60), 3);
    let err = registry.create("alice").await.unwrap_err();
    assert!(matches!(err, MatchError::IdExhausted(3)));
}
