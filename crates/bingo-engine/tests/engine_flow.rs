//! Integration tests for game lifecycles through the registry.

use std::sync::Arc;
use std::time::Duration;

use bingo_engine::{
    CardChoice, EngineConfig, EngineError, GameRegistry, GameSettings, GameStore,
    InMemoryGameStore, InMemoryWallet, StoredGame, Wallet,
};
use bingo_protocol::{
    Card, CardId, ErrorCode, Game, GameId, GameStatus, Grid, PlayerId, RoomEvent, RoomMessage,
    ViewerId, WinCategory,
};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

const CREATOR: PlayerId = PlayerId(1);

type Registry = GameRegistry<InMemoryWallet, InMemoryGameStore>;

struct Hall {
    registry: Registry,
    wallet: Arc<InMemoryWallet>,
    store: Arc<InMemoryGameStore>,
}

async fn hall() -> Hall {
    hall_with(EngineConfig {
        rng_seed: Some(42),
        ..EngineConfig::default()
    })
    .await
}

/// A hall whose finished games retire almost immediately.
async fn eager_hall() -> Hall {
    hall_with(EngineConfig {
        rng_seed: Some(42),
        retire_after: Duration::from_millis(10),
        ..EngineConfig::default()
    })
    .await
}

async fn hall_with(config: EngineConfig) -> Hall {
    let wallet = Arc::new(InMemoryWallet::new());
    let store = Arc::new(InMemoryGameStore::new());
    let registry = GameRegistry::new(Arc::clone(&wallet), Arc::clone(&store), config).unwrap();
    for id in 2..=6 {
        wallet.deposit(pid(id), 1_000).await;
    }
    Hall {
        registry,
        wallet,
        store,
    }
}

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

fn settings(min_cards: u32) -> GameSettings {
    GameSettings {
        card_price: 100,
        min_cards,
        ..GameSettings::default()
    }
}

/// A valid card with the free cell in the centre.
fn grid_a() -> Grid {
    [
        [1, 16, 31, 46, 61],
        [2, 17, 32, 47, 62],
        [3, 18, 0, 48, 63],
        [4, 19, 34, 49, 64],
        [5, 20, 35, 50, 65],
    ]
}

fn grid_b() -> Grid {
    [
        [6, 21, 36, 51, 66],
        [7, 22, 37, 52, 67],
        [8, 23, 0, 53, 68],
        [9, 24, 39, 54, 69],
        [10, 25, 40, 55, 70],
    ]
}

fn viewer() -> (mpsc::UnboundedSender<RoomMessage>, mpsc::UnboundedReceiver<RoomMessage>) {
    mpsc::unbounded_channel()
}

/// Creates a game with two cards sold (players 2 and 3) and starts it.
async fn running_game(hall: &Hall) -> (GameId, CardId, CardId) {
    let game = hall.registry.create_game(CREATOR, settings(2)).await.unwrap();
    let a = hall
        .registry
        .purchase_card(game.id, pid(2), CardChoice::Chosen(grid_a()))
        .await
        .unwrap();
    let b = hall
        .registry
        .purchase_card(game.id, pid(3), CardChoice::Chosen(grid_b()))
        .await
        .unwrap();
    hall.registry.start(game.id, CREATOR).await.unwrap();
    (game.id, a.id, b.id)
}

async fn draw_all(registry: &Registry, game_id: GameId) {
    for _ in 0..75 {
        registry.draw_next(game_id, CREATOR).await.unwrap();
    }
}

// =========================================================================
// Creation and purchases
// =========================================================================

#[tokio::test]
async fn test_create_game_starts_open_or_ready() {
    let hall = hall().await;

    let open = hall.registry.create_game(CREATOR, settings(2)).await.unwrap();
    assert_eq!(open.status, GameStatus::Open);
    assert_eq!(open.pot, 0);

    let ready = hall.registry.create_game(CREATOR, settings(0)).await.unwrap();
    assert_eq!(ready.status, GameStatus::Ready);

    assert_ne!(open.id, ready.id);
    assert_eq!(hall.store.len().await, 2);
}

#[tokio::test]
async fn test_create_game_validates_settings() {
    let hall = hall().await;
    let bad = GameSettings {
        card_price: 75,
        ..GameSettings::default()
    };
    let err = hall.registry.create_game(CREATOR, bad).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidSettings);
}

#[tokio::test]
async fn test_purchase_debits_and_reaches_ready() {
    let hall = hall().await;
    let game = hall.registry.create_game(CREATOR, settings(2)).await.unwrap();

    let card = hall
        .registry
        .purchase_card(game.id, pid(2), CardChoice::Random)
        .await
        .unwrap();
    assert_eq!(card.owner, pid(2));
    assert_eq!(card.price, 100);
    assert_eq!(card.grid[2][2], 0);
    assert_eq!(
        hall.registry.game(game.id).await.unwrap().status,
        GameStatus::Open
    );

    hall.registry
        .purchase_card(game.id, pid(3), CardChoice::Random)
        .await
        .unwrap();

    let game = hall.registry.game(game.id).await.unwrap();
    assert_eq!(game.status, GameStatus::Ready);
    assert_eq!(game.sold_cards, 2);
    assert_eq!(game.pot, 200);
    assert_eq!(hall.wallet.balance(pid(2)).await, 900);
    assert_eq!(hall.wallet.balance(pid(3)).await, 900);
}

#[tokio::test]
async fn test_purchase_rejections() {
    let hall = hall().await;
    let game = hall
        .registry
        .create_game(
            CREATOR,
            GameSettings {
                max_cards: 3,
                ..settings(1)
            },
        )
        .await
        .unwrap();

    let err = hall
        .registry
        .purchase_card(game.id, CREATOR, CardChoice::Random)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CreatorCannotPlay));

    let mut bad_grid = grid_a();
    bad_grid[0][0] = 70;
    let err = hall
        .registry
        .purchase_card(game.id, pid(2), CardChoice::Chosen(bad_grid))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidCard);

    for _ in 0..2 {
        hall.registry
            .purchase_card(game.id, pid(2), CardChoice::Random)
            .await
            .unwrap();
    }
    let err = hall
        .registry
        .purchase_card(game.id, pid(2), CardChoice::Random)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CardLimit { limit: 2, .. }));

    hall.registry
        .purchase_card(game.id, pid(3), CardChoice::Random)
        .await
        .unwrap();
    let err = hall
        .registry
        .purchase_card(game.id, pid(4), CardChoice::Random)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::GameFull);
}

#[tokio::test]
async fn test_purchase_without_funds_changes_nothing() {
    let hall = hall().await;
    let game = hall.registry.create_game(CREATOR, settings(1)).await.unwrap();

    let broke = pid(99);
    hall.wallet.deposit(broke, 30).await;
    let err = hall
        .registry
        .purchase_card(game.id, broke, CardChoice::Random)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InsufficientFunds { required: 100 }));
    assert_eq!(hall.wallet.balance(broke).await, 30);
    let game = hall.registry.game(game.id).await.unwrap();
    assert_eq!(game.sold_cards, 0);
    assert_eq!(game.status, GameStatus::Open);
    assert!(hall.registry.cards_of(game.id, broke).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cards_of_lists_only_that_players_cards() {
    let hall = hall().await;
    let game = hall.registry.create_game(CREATOR, settings(1)).await.unwrap();
    let first = hall
        .registry
        .purchase_card(game.id, pid(2), CardChoice::Random)
        .await
        .unwrap();
    hall.registry
        .purchase_card(game.id, pid(3), CardChoice::Random)
        .await
        .unwrap();

    let cards = hall.registry.cards_of(game.id, pid(2)).await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].id, first.id);
}

// =========================================================================
// Start and draws
// =========================================================================

#[tokio::test]
async fn test_start_requires_creator_and_minimum() {
    let hall = hall().await;
    let game = hall.registry.create_game(CREATOR, settings(2)).await.unwrap();

    let err = hall.registry.start(game.id, pid(2)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotCreator);

    let err = hall.registry.start(game.id, CREATOR).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::MinimumNotMet {
            required: 2,
            sold: 0
        }
    ));

    let err = hall.registry.draw_next(game.id, CREATOR).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTransition);
}

#[tokio::test]
async fn test_only_creator_draws() {
    let hall = hall().await;
    let (game_id, _, _) = running_game(&hall).await;

    let err = hall.registry.draw_next(game_id, pid(2)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotCreator);
}

#[tokio::test]
async fn test_draw_75_unique_then_pool_exhausted() {
    let hall = hall().await;
    let (game_id, _, _) = running_game(&hall).await;

    let mut seen = std::collections::HashSet::new();
    for _ in 0..75 {
        let number = hall.registry.draw_next(game_id, CREATOR).await.unwrap();
        assert!((1..=75).contains(&number));
        assert!(seen.insert(number));
    }

    let err = hall.registry.draw_next(game_id, CREATOR).await.unwrap_err();
    assert!(matches!(err, EngineError::PoolExhausted));

    let game = hall.registry.game(game_id).await.unwrap();
    assert_eq!(game.drawn_numbers.len(), 75);
    assert_eq!(game.status, GameStatus::Running);
}

// =========================================================================
// Claims
// =========================================================================

#[tokio::test]
async fn test_full_card_claim_pays_highest_tier() {
    let hall = hall().await;
    let (game_id, card_a, _) = running_game(&hall).await;
    draw_all(&hall.registry, game_id).await;

    let payout = hall.registry.claim_win(game_id, card_a, pid(2)).await.unwrap();

    assert_eq!(payout.category, WinCategory::FullCard);
    assert!(payout.categories.contains(&WinCategory::FullCard));
    assert!(payout.categories.contains(&WinCategory::Line));
    // 40 % of a 200 pot.
    assert_eq!(payout.amount, 80);
    assert_eq!(hall.wallet.balance(pid(2)).await, 980);

    let game = hall.registry.game(game_id).await.unwrap();
    assert_eq!(game.status, GameStatus::Finished);
    assert_eq!(game.winner, Some(card_a));
    assert!(game.ended_at.is_some());

    let cards = hall.registry.cards_of(game_id, pid(2)).await.unwrap();
    assert!(cards[0].is_winner);
    assert_eq!(cards[0].payout, 80);
}

#[tokio::test]
async fn test_line_claim_pays_line_share() {
    let hall = hall().await;
    let (game_id, card_a, _) = running_game(&hall).await;

    // Draw until card A completes something, then claim immediately.
    let validator = bingo_engine::PatternValidator::standard(true);
    loop {
        hall.registry.draw_next(game_id, CREATOR).await.unwrap();
        let drawn = hall.registry.game(game_id).await.unwrap().drawn_numbers;
        let set = bingo_engine::DrawnNumbers::from(drawn.as_slice());
        if validator.is_winner(&grid_a(), &set) {
            break;
        }
    }

    let payout = hall.registry.claim_win(game_id, card_a, pid(2)).await.unwrap();
    assert!(payout.amount > 0);
    assert!(payout.amount <= 200);
}

#[tokio::test]
async fn test_claim_without_pattern_is_rejected() {
    let hall = hall().await;
    let (game_id, card_a, _) = running_game(&hall).await;

    let err = hall
        .registry
        .claim_win(game_id, card_a, pid(2))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoWinningPattern);
    assert_eq!(
        hall.registry.game(game_id).await.unwrap().status,
        GameStatus::Running
    );
}

#[tokio::test]
async fn test_claim_checks_card_ownership() {
    let hall = hall().await;
    let (game_id, card_a, _) = running_game(&hall).await;
    draw_all(&hall.registry, game_id).await;

    let err = hall
        .registry
        .claim_win(game_id, card_a, pid(3))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotCardOwner);

    let err = hall
        .registry
        .claim_win(game_id, CardId(u64::MAX), pid(3))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownCard);
}

#[tokio::test]
async fn test_claim_before_start_is_invalid_transition() {
    let hall = hall().await;
    let game = hall.registry.create_game(CREATOR, settings(1)).await.unwrap();
    let card = hall
        .registry
        .purchase_card(game.id, pid(2), CardChoice::Random)
        .await
        .unwrap();

    let err = hall
        .registry
        .claim_win(game.id, card.id, pid(2))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTransition);
}

#[tokio::test]
async fn test_second_claim_is_already_decided() {
    let hall = hall().await;
    let (game_id, card_a, card_b) = running_game(&hall).await;
    draw_all(&hall.registry, game_id).await;

    hall.registry.claim_win(game_id, card_a, pid(2)).await.unwrap();
    let err = hall
        .registry
        .claim_win(game_id, card_b, pid(3))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::AlreadyDecided(id) if id == game_id));
    assert_eq!(hall.wallet.balance(pid(3)).await, 900);

    let err = hall.registry.draw_next(game_id, CREATOR).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::GameClosed);
}

// =========================================================================
// Cancel
// =========================================================================

#[tokio::test]
async fn test_cancel_refunds_every_card() {
    let hall = hall().await;
    let game = hall.registry.create_game(CREATOR, settings(5)).await.unwrap();
    let (tx, mut rx) = viewer();
    let watcher = hall.registry.allocate_viewer();
    hall.registry.join(watcher, game.id, tx).await.unwrap();
    let _snapshot = rx.recv().await.unwrap();

    for player in [2, 2, 3] {
        hall.registry
            .purchase_card(game.id, pid(player), CardChoice::Random)
            .await
            .unwrap();
    }
    assert_eq!(hall.wallet.balance(pid(2)).await, 800);

    let err = hall.registry.cancel(game.id, pid(2)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotCreator);

    let cancelled = hall.registry.cancel(game.id, CREATOR).await.unwrap();
    assert_eq!(cancelled.status, GameStatus::Cancelled);
    assert_eq!(hall.wallet.balance(pid(2)).await, 1_000);
    assert_eq!(hall.wallet.balance(pid(3)).await, 1_000);

    for _ in 0..3 {
        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg.event, RoomEvent::PlayerJoined { .. }));
    }
    let msg = rx.recv().await.unwrap();
    assert_eq!(msg.event, RoomEvent::Cancelled { refunded_count: 3 });

    let cards = hall.registry.cards_of(game.id, pid(2)).await.unwrap();
    assert!(cards.iter().all(|c| c.refunded));

    // Terminal: nothing moves any more.
    let err = hall
        .registry
        .purchase_card(game.id, pid(4), CardChoice::Random)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::GameClosed);
    let err = hall.registry.start(game.id, CREATOR).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::GameClosed);
    let err = hall.registry.cancel(game.id, CREATOR).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::GameClosed);
}

#[tokio::test]
async fn test_cancel_running_game_is_invalid() {
    let hall = hall().await;
    let (game_id, _, _) = running_game(&hall).await;

    let err = hall.registry.cancel(game_id, CREATOR).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTransition);
}

// =========================================================================
// Viewers
// =========================================================================

#[tokio::test]
async fn test_viewer_gets_snapshot_then_ordered_events() {
    let hall = hall().await;
    let game = hall.registry.create_game(CREATOR, settings(1)).await.unwrap();

    let (tx, mut rx) = viewer();
    let watcher = hall.registry.allocate_viewer();
    hall.registry.join(watcher, game.id, tx).await.unwrap();

    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.seq, 0);
    assert_eq!(
        snapshot.event,
        RoomEvent::Snapshot {
            status: GameStatus::Open,
            drawn_numbers: vec![],
            sold_tickets: 0,
            pot: 0,
        }
    );

    hall.registry
        .purchase_card(game.id, pid(2), CardChoice::Random)
        .await
        .unwrap();
    hall.registry.start(game.id, CREATOR).await.unwrap();
    let number = hall.registry.draw_next(game.id, CREATOR).await.unwrap();

    let joined = rx.recv().await.unwrap();
    assert_eq!(joined.seq, 1);
    assert_eq!(
        joined.event,
        RoomEvent::PlayerJoined {
            player_id: pid(2),
            sold_tickets: 1,
        }
    );

    let started = rx.recv().await.unwrap();
    assert_eq!(started.seq, 2);
    assert_eq!(started.event, RoomEvent::Started);

    let drawn = rx.recv().await.unwrap();
    assert_eq!(drawn.seq, 3);
    assert_eq!(
        drawn.event,
        RoomEvent::NumberDrawn {
            number,
            drawn_count: 1,
        }
    );
    assert_eq!(drawn.game_id, game.id);
}

#[tokio::test]
async fn test_late_viewer_snapshot_reflects_progress() {
    let hall = hall().await;
    let (game_id, _, _) = running_game(&hall).await;
    for _ in 0..5 {
        hall.registry.draw_next(game_id, CREATOR).await.unwrap();
    }

    let (tx, mut rx) = viewer();
    let watcher = hall.registry.allocate_viewer();
    hall.registry.join(watcher, game_id, tx).await.unwrap();

    let snapshot = rx.recv().await.unwrap();
    let game = hall.registry.game(game_id).await.unwrap();
    // Two purchases, one start, five draws.
    assert_eq!(snapshot.seq, 8);
    match snapshot.event {
        RoomEvent::Snapshot {
            status,
            drawn_numbers,
            sold_tickets,
            pot,
        } => {
            assert_eq!(status, GameStatus::Running);
            assert_eq!(drawn_numbers, game.drawn_numbers);
            assert_eq!(sold_tickets, 2);
            assert_eq!(pot, 200);
        }
        other => panic!("expected snapshot, got {other:?}"),
    }

    hall.registry.draw_next(game_id, CREATOR).await.unwrap();
    assert_eq!(rx.recv().await.unwrap().seq, 9);
}

#[tokio::test]
async fn test_winner_and_finished_reach_every_viewer() {
    let hall = hall().await;
    let (game_id, card_a, _) = running_game(&hall).await;
    draw_all(&hall.registry, game_id).await;

    let mut receivers = Vec::new();
    for _ in 0..3 {
        let (tx, rx) = viewer();
        let watcher = hall.registry.allocate_viewer();
        hall.registry.join(watcher, game_id, tx).await.unwrap();
        receivers.push(rx);
    }

    hall.registry.claim_win(game_id, card_a, pid(2)).await.unwrap();

    for rx in &mut receivers {
        let _snapshot = rx.recv().await.unwrap();
        let winner = rx.recv().await.unwrap();
        assert_eq!(
            winner.event,
            RoomEvent::Winner {
                card_id: card_a,
                claimant_id: pid(2),
                category: WinCategory::FullCard,
                amount: 80,
            }
        );
        let finished = rx.recv().await.unwrap();
        assert_eq!(finished.event, RoomEvent::Finished);
        assert_eq!(finished.seq, winner.seq + 1);
    }
}

#[tokio::test]
async fn test_viewer_watches_one_game_at_a_time() {
    let hall = hall().await;
    let first = hall.registry.create_game(CREATOR, settings(1)).await.unwrap();
    let second = hall.registry.create_game(CREATOR, settings(1)).await.unwrap();
    let watcher = hall.registry.allocate_viewer();

    let (tx, _rx) = viewer();
    hall.registry.join(watcher, first.id, tx.clone()).await.unwrap();

    let err = hall
        .registry
        .join(watcher, second.id, tx.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyViewing(v) if v == watcher));

    assert_eq!(hall.registry.leave(watcher).await.unwrap(), first.id);
    hall.registry.join(watcher, second.id, tx).await.unwrap();
    assert_eq!(hall.registry.viewing(watcher).await, Some(second.id));

    hall.registry.leave(watcher).await.unwrap();
    let err = hall.registry.leave(watcher).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotViewing);
}

#[tokio::test]
async fn test_join_unknown_game_is_not_found() {
    let hall = hall().await;
    let (tx, _rx) = viewer();
    let err = hall
        .registry
        .join(ViewerId(u64::MAX), GameId(u64::MAX), tx)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

// =========================================================================
// Retirement and rehydration
// =========================================================================

#[tokio::test]
async fn test_finished_game_retires_and_rehydrates() {
    let hall = eager_hall().await;
    let (game_id, card_a, card_b) = running_game(&hall).await;
    draw_all(&hall.registry, game_id).await;
    hall.registry.claim_win(game_id, card_a, pid(2)).await.unwrap();

    // Let the actor wind down and the registry drop its handle.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!hall.registry.active_games().await.contains(&game_id));

    let game = hall.registry.game(game_id).await.unwrap();
    assert_eq!(game.status, GameStatus::Finished);
    assert_eq!(game.winner, Some(card_a));
    assert_eq!(game.drawn_numbers.len(), 75);

    let err = hall
        .registry
        .claim_win(game_id, card_b, pid(3))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyDecided);
}

#[tokio::test]
async fn test_watched_finished_game_stays_live_until_last_viewer_leaves() {
    let hall = eager_hall().await;
    let (game_id, card_a, _) = running_game(&hall).await;
    let (tx, _rx) = viewer();
    let watcher = hall.registry.allocate_viewer();
    hall.registry.join(watcher, game_id, tx).await.unwrap();

    draw_all(&hall.registry, game_id).await;
    hall.registry.claim_win(game_id, card_a, pid(2)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(hall.registry.active_games().await.contains(&game_id));

    hall.registry.leave(watcher).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!hall.registry.active_games().await.contains(&game_id));
}

#[tokio::test]
async fn test_vanished_viewer_does_not_pin_finished_game() {
    let hall = eager_hall().await;
    let game = hall.registry.create_game(CREATOR, settings(2)).await.unwrap();
    let (tx, rx) = viewer();
    let watcher = hall.registry.allocate_viewer();
    hall.registry.join(watcher, game.id, tx).await.unwrap();
    hall.registry.cancel(game.id, CREATOR).await.unwrap();

    // The receiver goes away without a leave.
    drop(rx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!hall.registry.active_games().await.contains(&game.id));
    assert_eq!(
        hall.registry.game(game.id).await.unwrap().status,
        GameStatus::Cancelled
    );
}

#[tokio::test]
async fn test_new_games_skip_ids_already_stored() {
    let hall = hall().await;
    // Games left behind by an earlier process.
    for id in [1, 2] {
        let stored = StoredGame {
            game: Game {
                id: GameId(id),
                creator: CREATOR,
                status: GameStatus::Finished,
                card_price: 100,
                pot: 0,
                sold_cards: 0,
                drawn_numbers: vec![],
                winner: None,
                created_at: 0,
                started_at: None,
                ended_at: Some(0),
            },
            settings: settings(2),
            cards: vec![],
        };
        hall.store.insert_game(&stored).await.unwrap();
    }

    let game = hall.registry.create_game(CREATOR, settings(2)).await.unwrap();
    assert_eq!(game.id, GameId(3));
    assert_eq!(hall.store.len().await, 3);
    assert_eq!(
        hall.registry.game(GameId(1)).await.unwrap().status,
        GameStatus::Finished
    );
}

#[tokio::test]
async fn test_stored_card_with_blank_cell_claims_full_card() {
    let hall = hall().await;
    // Row 2 has a blank in column 1 besides the free centre.
    let grid: Grid = [
        [1, 16, 31, 46, 61],
        [2, 17, 32, 47, 62],
        [3, 0, 33, 48, 63],
        [4, 19, 34, 49, 64],
        [5, 20, 35, 50, 65],
    ];
    let game_id = GameId(700);
    let card = |id: u64, owner: u64, grid: Grid| Card {
        id: CardId(id),
        game_id,
        owner: pid(owner),
        grid,
        price: 100,
        is_winner: false,
        refunded: false,
        payout: 0,
    };
    let stored = StoredGame {
        game: Game {
            id: game_id,
            creator: CREATOR,
            status: GameStatus::Running,
            card_price: 100,
            pot: 200,
            sold_cards: 2,
            drawn_numbers: grid.iter().flatten().copied().filter(|&n| n != 0).collect(),
            winner: None,
            created_at: 0,
            started_at: Some(0),
            ended_at: None,
        },
        settings: settings(2),
        cards: vec![card(7_000, 2, grid), card(7_001, 3, grid_b())],
    };
    assert_eq!(stored.game.drawn_numbers.len(), 24);
    hall.store.insert_game(&stored).await.unwrap();

    let payout = hall
        .registry
        .claim_win(game_id, CardId(7_000), pid(2))
        .await
        .unwrap();
    assert_eq!(payout.claimant, pid(2));
    assert_eq!(payout.category, WinCategory::FullCard);
    assert!(payout.categories.contains(&WinCategory::FullCard));
    assert_eq!(payout.amount, 80);
    assert_eq!(hall.wallet.balance(pid(2)).await, 1_080);

    let game = hall.registry.game(game_id).await.unwrap();
    assert_eq!(game.status, GameStatus::Finished);
    assert_eq!(game.winner, Some(CardId(7_000)));
}

#[tokio::test]
async fn test_shutdown_then_rehydrate_resumes_draws() {
    let hall = hall().await;
    let (game_id, _, _) = running_game(&hall).await;
    for _ in 0..10 {
        hall.registry.draw_next(game_id, CREATOR).await.unwrap();
    }
    let before = hall.registry.game(game_id).await.unwrap().drawn_numbers;

    hall.registry.shutdown().await;
    assert!(hall.registry.active_games().await.is_empty());

    // Rehydrated from the store: the ten numbers stay drawn.
    for _ in 0..65 {
        hall.registry.draw_next(game_id, CREATOR).await.unwrap();
    }
    let after = hall.registry.game(game_id).await.unwrap().drawn_numbers;
    assert_eq!(&after[..10], before.as_slice());
    let unique: std::collections::HashSet<u8> = after.iter().copied().collect();
    assert_eq!(unique.len(), 75);

    let err = hall.registry.draw_next(game_id, CREATOR).await.unwrap_err();
    assert!(matches!(err, EngineError::PoolExhausted));
}

#[tokio::test]
async fn test_store_holds_the_committed_game() {
    let hall = hall().await;
    let (game_id, card_a, _) = running_game(&hall).await;
    draw_all(&hall.registry, game_id).await;
    hall.registry.claim_win(game_id, card_a, pid(2)).await.unwrap();

    let stored = hall.store.load_game(game_id).await.unwrap().unwrap();
    assert_eq!(stored.game.status, GameStatus::Finished);
    let winners: Vec<_> = stored.cards.iter().filter(|c| c.is_winner).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].id, card_a);

    // Replaying the payout key is a no-op.
    let key = bingo_engine::payout_key(game_id, card_a);
    hall.wallet.credit(pid(2), 80, &key).await.unwrap();
    assert_eq!(hall.wallet.balance(pid(2)).await, 980);
}
