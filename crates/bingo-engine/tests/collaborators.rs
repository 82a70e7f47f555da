//! Wallet and store failures: every mutation is all-or-nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bingo_engine::{
    CardChoice, EngineConfig, EngineError, GameRegistry, GameSettings, GameStore,
    InMemoryGameStore, InMemoryWallet, StoreError, StoredGame, Wallet, WalletError, payout_key,
};
use bingo_protocol::{Card, Credits, Game, GameId, GameStatus, Grid, PlayerId};

// =========================================================================
// Flaky collaborators
// =========================================================================

/// Wraps [`InMemoryWallet`] and fails on demand.
#[derive(Default)]
struct FlakyWallet {
    inner: InMemoryWallet,
    fail_debit: AtomicBool,
    /// Debits are applied, but the caller is told they failed.
    lose_debit_reply: AtomicBool,
    /// Credits succeed this many times, then fail. `usize::MAX` disables.
    fail_credit_after: AtomicUsize,
    credits: AtomicUsize,
}

impl FlakyWallet {
    fn new() -> Self {
        Self {
            fail_credit_after: AtomicUsize::new(usize::MAX),
            ..Self::default()
        }
    }

    fn fail_credits_after(&self, n: usize) {
        self.credits.store(0, Ordering::SeqCst);
        self.fail_credit_after.store(n, Ordering::SeqCst);
    }

    fn heal(&self) {
        self.fail_debit.store(false, Ordering::SeqCst);
        self.lose_debit_reply.store(false, Ordering::SeqCst);
        self.fail_credit_after.store(usize::MAX, Ordering::SeqCst);
    }
}

impl Wallet for FlakyWallet {
    async fn debit(&self, account: PlayerId, amount: Credits, key: &str) -> Result<(), WalletError> {
        if self.fail_debit.load(Ordering::SeqCst) {
            return Err(WalletError::Unavailable("debit refused".into()));
        }
        self.inner.debit(account, amount, key).await?;
        if self.lose_debit_reply.load(Ordering::SeqCst) {
            return Err(WalletError::Unavailable("connection reset".into()));
        }
        Ok(())
    }

    async fn credit(&self, account: PlayerId, amount: Credits, key: &str) -> Result<(), WalletError> {
        let done = self.credits.fetch_add(1, Ordering::SeqCst);
        if done >= self.fail_credit_after.load(Ordering::SeqCst) {
            return Err(WalletError::Unavailable("credit refused".into()));
        }
        self.inner.credit(account, amount, key).await
    }

    async fn reverse(&self, key: &str) -> Result<(), WalletError> {
        self.inner.reverse(key).await
    }
}

/// Wraps [`InMemoryGameStore`] and rejects commits on demand.
#[derive(Default)]
struct FailingStore {
    inner: InMemoryGameStore,
    fail_commit: AtomicBool,
}

impl FailingStore {
    fn set_failing(&self, failing: bool) {
        self.fail_commit.store(failing, Ordering::SeqCst);
    }
}

impl GameStore for FailingStore {
    async fn next_game_id(&self) -> Result<GameId, StoreError> {
        self.inner.next_game_id().await
    }

    async fn insert_game(&self, stored: &StoredGame) -> Result<(), StoreError> {
        self.inner.insert_game(stored).await
    }

    async fn load_game(&self, game_id: GameId) -> Result<Option<StoredGame>, StoreError> {
        self.inner.load_game(game_id).await
    }

    async fn commit(&self, game: &Game, cards: &[Card]) -> Result<(), StoreError> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk on fire".into()));
        }
        self.inner.commit(game, cards).await
    }
}

// =========================================================================
// Helpers
// =========================================================================

const CREATOR: PlayerId = PlayerId(1);
const ALICE: PlayerId = PlayerId(2);
const BOB: PlayerId = PlayerId(3);

struct Rig {
    registry: GameRegistry<FlakyWallet, FailingStore>,
    wallet: Arc<FlakyWallet>,
    store: Arc<FailingStore>,
}

async fn rig() -> Rig {
    let wallet = Arc::new(FlakyWallet::new());
    let store = Arc::new(FailingStore::default());
    let config = EngineConfig {
        rng_seed: Some(7),
        ..EngineConfig::default()
    };
    let registry = GameRegistry::new(Arc::clone(&wallet), Arc::clone(&store), config).unwrap();
    wallet.inner.deposit(ALICE, 1_000).await;
    wallet.inner.deposit(BOB, 1_000).await;
    Rig {
        registry,
        wallet,
        store,
    }
}

fn grid() -> Grid {
    [
        [1, 16, 31, 46, 61],
        [2, 17, 32, 47, 62],
        [3, 18, 0, 48, 63],
        [4, 19, 34, 49, 64],
        [5, 20, 35, 50, 65],
    ]
}

/// A running game with every number drawn, so each card is a winner.
async fn fully_drawn_game(rig: &Rig) -> (GameId, Card) {
    let game = rig
        .registry
        .create_game(CREATOR, GameSettings::default())
        .await
        .unwrap();
    let card = rig
        .registry
        .purchase_card(game.id, ALICE, CardChoice::Chosen(grid()))
        .await
        .unwrap();
    rig.registry
        .purchase_card(game.id, BOB, CardChoice::Random)
        .await
        .unwrap();
    rig.registry.start(game.id, CREATOR).await.unwrap();
    for _ in 0..75 {
        rig.registry.draw_next(game.id, CREATOR).await.unwrap();
    }
    (game.id, card)
}

// =========================================================================
// Payout
// =========================================================================

#[tokio::test]
async fn test_failed_payout_credit_leaves_game_running() {
    let rig = rig().await;
    let (game_id, card) = fully_drawn_game(&rig).await;

    rig.wallet.fail_credits_after(0);
    let err = rig
        .registry
        .claim_win(game_id, card.id, ALICE)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CollaboratorUnavailable(_)));
    assert!(err.code().is_retryable());

    let game = rig.registry.game(game_id).await.unwrap();
    assert_eq!(game.status, GameStatus::Running);
    assert_eq!(game.winner, None);
    assert_eq!(rig.wallet.inner.balance(ALICE).await, 900);

    // Recovery: the same claim now succeeds.
    rig.wallet.heal();
    let payout = rig.registry.claim_win(game_id, card.id, ALICE).await.unwrap();
    assert_eq!(payout.amount, 80);
    assert_eq!(rig.wallet.inner.balance(ALICE).await, 980);
}

#[tokio::test]
async fn test_failed_finish_commit_reverses_payout() {
    let rig = rig().await;
    let (game_id, card) = fully_drawn_game(&rig).await;

    rig.store.set_failing(true);
    let err = rig
        .registry
        .claim_win(game_id, card.id, ALICE)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CollaboratorUnavailable(_)));

    assert_eq!(rig.wallet.inner.balance(ALICE).await, 900);
    assert!(
        !rig.wallet
            .inner
            .is_applied(&payout_key(game_id, card.id))
            .await
    );
    assert_eq!(
        rig.registry.game(game_id).await.unwrap().status,
        GameStatus::Running
    );

    // A reversed payout key can be applied again.
    rig.store.set_failing(false);
    rig.registry.claim_win(game_id, card.id, ALICE).await.unwrap();
    assert_eq!(rig.wallet.inner.balance(ALICE).await, 980);

    let stored = rig.store.load_game(game_id).await.unwrap().unwrap();
    assert_eq!(stored.game.winner, Some(card.id));
}

// =========================================================================
// Purchase, cancel and draw
// =========================================================================

#[tokio::test]
async fn test_failed_debit_sells_nothing() {
    let rig = rig().await;
    let game = rig
        .registry
        .create_game(CREATOR, GameSettings::default())
        .await
        .unwrap();

    rig.wallet.fail_debit.store(true, Ordering::SeqCst);
    let err = rig
        .registry
        .purchase_card(game.id, ALICE, CardChoice::Random)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CollaboratorUnavailable(_)));

    let game = rig.registry.game(game.id).await.unwrap();
    assert_eq!(game.sold_cards, 0);
    assert_eq!(game.pot, 0);
}

#[tokio::test]
async fn test_lost_debit_reply_is_reversed() {
    let rig = rig().await;
    let game = rig
        .registry
        .create_game(CREATOR, GameSettings::default())
        .await
        .unwrap();

    rig.wallet.lose_debit_reply.store(true, Ordering::SeqCst);
    let err = rig
        .registry
        .purchase_card(game.id, ALICE, CardChoice::Random)
        .await
        .unwrap_err();
    assert!(err.code().is_retryable());
    assert_eq!(rig.wallet.inner.balance(ALICE).await, 1_000);

    let snapshot = rig.registry.game(game.id).await.unwrap();
    assert_eq!(snapshot.sold_cards, 0);
    assert_eq!(snapshot.pot, 0);

    // Retrying charges the buyer exactly once.
    rig.wallet.heal();
    rig.registry
        .purchase_card(game.id, ALICE, CardChoice::Random)
        .await
        .unwrap();
    assert_eq!(rig.wallet.inner.balance(ALICE).await, 900);
    assert_eq!(rig.registry.game(game.id).await.unwrap().pot, 100);
}

#[tokio::test]
async fn test_failed_purchase_commit_reverses_debit() {
    let rig = rig().await;
    let game = rig
        .registry
        .create_game(CREATOR, GameSettings::default())
        .await
        .unwrap();

    rig.store.set_failing(true);
    let err = rig
        .registry
        .purchase_card(game.id, ALICE, CardChoice::Random)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CollaboratorUnavailable(_)));
    assert_eq!(rig.wallet.inner.balance(ALICE).await, 1_000);

    let game = rig.registry.game(game.id).await.unwrap();
    assert_eq!(game.sold_cards, 0);
    assert!(rig.registry.cards_of(game.id, ALICE).await.unwrap().is_empty());

    rig.store.set_failing(false);
    rig.registry
        .purchase_card(game.id, ALICE, CardChoice::Random)
        .await
        .unwrap();
    assert_eq!(rig.wallet.inner.balance(ALICE).await, 900);
}

#[tokio::test]
async fn test_failed_refund_rolls_back_cancel() {
    let rig = rig().await;
    let game = rig
        .registry
        .create_game(CREATOR, GameSettings::default())
        .await
        .unwrap();
    rig.registry
        .purchase_card(game.id, ALICE, CardChoice::Random)
        .await
        .unwrap();
    rig.registry
        .purchase_card(game.id, BOB, CardChoice::Random)
        .await
        .unwrap();

    // First refund lands, second fails: the first must be undone.
    rig.wallet.fail_credits_after(1);
    let err = rig.registry.cancel(game.id, CREATOR).await.unwrap_err();
    assert!(matches!(err, EngineError::CollaboratorUnavailable(_)));

    assert_eq!(rig.wallet.inner.balance(ALICE).await, 900);
    assert_eq!(rig.wallet.inner.balance(BOB).await, 900);
    let snapshot = rig.registry.game(game.id).await.unwrap();
    assert_eq!(snapshot.status, GameStatus::Ready);

    rig.wallet.heal();
    let cancelled = rig.registry.cancel(game.id, CREATOR).await.unwrap();
    assert_eq!(cancelled.status, GameStatus::Cancelled);
    assert_eq!(rig.wallet.inner.balance(ALICE).await, 1_000);
    assert_eq!(rig.wallet.inner.balance(BOB).await, 1_000);
}

#[tokio::test]
async fn test_failed_cancel_commit_reverses_refunds() {
    let rig = rig().await;
    let game = rig
        .registry
        .create_game(CREATOR, GameSettings::default())
        .await
        .unwrap();
    rig.registry
        .purchase_card(game.id, ALICE, CardChoice::Random)
        .await
        .unwrap();

    rig.store.set_failing(true);
    assert!(rig.registry.cancel(game.id, CREATOR).await.is_err());
    assert_eq!(rig.wallet.inner.balance(ALICE).await, 900);
    assert_eq!(
        rig.registry.game(game.id).await.unwrap().status,
        GameStatus::Open
    );
}

#[tokio::test]
async fn test_failed_draw_commit_keeps_number_in_pool() {
    let rig = rig().await;
    let game = rig
        .registry
        .create_game(CREATOR, GameSettings::default())
        .await
        .unwrap();
    rig.registry
        .purchase_card(game.id, ALICE, CardChoice::Random)
        .await
        .unwrap();
    rig.registry
        .purchase_card(game.id, BOB, CardChoice::Random)
        .await
        .unwrap();
    rig.registry.start(game.id, CREATOR).await.unwrap();

    rig.store.set_failing(true);
    assert!(rig.registry.draw_next(game.id, CREATOR).await.is_err());
    assert!(rig.registry.game(game.id).await.unwrap().drawn_numbers.is_empty());

    // All 75 numbers are still available.
    rig.store.set_failing(false);
    for _ in 0..75 {
        rig.registry.draw_next(game.id, CREATOR).await.unwrap();
    }
    let err = rig.registry.draw_next(game.id, CREATOR).await.unwrap_err();
    assert!(matches!(err, EngineError::PoolExhausted));
}
