//! Game registry: creates, finds, rehydrates and retires game actors.
//!
//! The registry is the front door of the engine. Callers name a game by
//! id and the registry finds the actor that owns it, starting one from
//! the store if none is running.
//!
//! # Handle lifecycle
//!
//! ```text
//! create_game ──► live ──► terminal, no viewers ──► retired ──► (reaped)
//!                  ▲                                                │
//!                  └──────────── next reference loads it ◄──────────┘
//! ```
//!
//! A request can race with retirement and reach an actor that has just
//! closed its mailbox. The registry retries such a request once, on a
//! freshly loaded actor.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bingo_protocol::{Card, CardId, Game, GameId, GameStatus, PayoutResult, PlayerId, ViewerId};
use tokio::sync::{RwLock, mpsc};

use crate::broadcast::ViewerSender;
use crate::game::{CardChoice, GameContext, GameHandle, now_ms, spawn_game};
use crate::store::StoredGame;
use crate::{EngineConfig, EngineError, GameSettings, GameStore, Wallet};

/// Counter for viewer connection IDs.
static NEXT_VIEWER_ID: AtomicU64 = AtomicU64::new(1);

type GameMap = Arc<RwLock<HashMap<GameId, GameHandle>>>;

/// Process-wide table of live games.
///
/// The map lock is held only to look up or insert a handle, never while
/// a game processes a command. A game without a live actor is loaded
/// from the store on first reference. An actor retires on its own once
/// its game is terminal and nobody is watching; a background task then
/// drops its handle from the map.
pub struct GameRegistry<W, S> {
    ctx: GameContext<W, S>,
    games: GameMap,
    /// Which game each viewer is watching. One game per viewer.
    viewers: Arc<RwLock<HashMap<ViewerId, GameId>>>,
}

impl<W, S> Clone for GameRegistry<W, S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            games: Arc::clone(&self.games),
            viewers: Arc::clone(&self.viewers),
        }
    }
}

impl<W: Wallet, S: GameStore> GameRegistry<W, S> {
    /// Creates a registry. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// [`EngineError::InvalidSettings`] if `config` does not validate.
    pub fn new(wallet: Arc<W>, store: Arc<S>, config: EngineConfig) -> Result<Self, EngineError> {
        let config = config.validated()?;
        let (retired_tx, retired_rx) = mpsc::unbounded_channel();
        let games: GameMap = Arc::new(RwLock::new(HashMap::new()));

        tokio::spawn(reap_retired(Arc::clone(&games), retired_rx));

        Ok(Self {
            ctx: GameContext {
                wallet,
                store,
                config: Arc::new(config),
                retired: retired_tx,
            },
            games,
            viewers: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn wallet(&self) -> &Arc<W> {
        &self.ctx.wallet
    }

    pub fn store(&self) -> &Arc<S> {
        &self.ctx.store
    }

    /// A fresh id for a viewer connection.
    pub fn allocate_viewer(&self) -> ViewerId {
        ViewerId(NEXT_VIEWER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates and persists a game, then spawns its actor.
    ///
    /// A game whose minimum is 0 starts `READY`.
    pub async fn create_game(
        &self,
        creator: PlayerId,
        settings: GameSettings,
    ) -> Result<Game, EngineError> {
        settings.validate(&self.ctx.config)?;

        let game_id = self.ctx.store.next_game_id().await?;
        let status = if settings.min_cards == 0 {
            GameStatus::Ready
        } else {
            GameStatus::Open
        };
        let game = Game {
            id: game_id,
            creator,
            status,
            card_price: settings.card_price,
            pot: 0,
            sold_cards: 0,
            drawn_numbers: Vec::new(),
            winner: None,
            created_at: now_ms(),
            started_at: None,
            ended_at: None,
        };
        let stored = StoredGame {
            game: game.clone(),
            settings,
            cards: Vec::new(),
        };
        self.ctx.store.insert_game(&stored).await?;

        let handle = spawn_game(stored, self.ctx.clone());
        self.games.write().await.insert(game_id, handle);

        tracing::info!(
            %game_id,
            creator = %creator,
            card_price = game.card_price,
            %status,
            "game created"
        );
        Ok(game)
    }

    /// Returns a live handle, spawning an actor from the store if needed.
    async fn handle(&self, game_id: GameId) -> Result<GameHandle, EngineError> {
        {
            let games = self.games.read().await;
            if let Some(handle) = games.get(&game_id) {
                if !handle.is_closed() {
                    return Ok(handle.clone());
                }
            }
        }

        // Load outside the lock; another caller may win the race below.
        let stored = self
            .ctx
            .store
            .load_game(game_id)
            .await?
            .ok_or(EngineError::NotFound(game_id))?;

        let mut games = self.games.write().await;
        if let Some(handle) = games.get(&game_id) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }
        let handle = spawn_game(stored, self.ctx.clone());
        games.insert(game_id, handle.clone());
        tracing::info!(%game_id, "game rehydrated");
        Ok(handle)
    }

    /// Runs `op` against the game's actor. If the actor retired before
    /// answering, runs it once more against a fresh one.
    async fn with_game<T, F, Fut>(&self, game_id: GameId, op: F) -> Result<T, EngineError>
    where
        F: Fn(GameHandle) -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let handle = self.handle(game_id).await?;
        match op(handle).await {
            Err(EngineError::RoomUnavailable(_)) => {
                tracing::debug!(%game_id, "game actor gone, retrying");
                let handle = self.handle(game_id).await?;
                op(handle).await
            }
            other => other,
        }
    }

    pub async fn purchase_card(
        &self,
        game_id: GameId,
        buyer: PlayerId,
        choice: CardChoice,
    ) -> Result<Card, EngineError> {
        self.with_game(game_id, |handle| {
            let choice = choice.clone();
            async move { handle.purchase(buyer, choice).await }
        })
        .await
    }

    pub async fn start(&self, game_id: GameId, requester: PlayerId) -> Result<Game, EngineError> {
        self.with_game(game_id, |handle| async move { handle.start(requester).await })
            .await
    }

    pub async fn cancel(&self, game_id: GameId, requester: PlayerId) -> Result<Game, EngineError> {
        self.with_game(game_id, |handle| async move { handle.cancel(requester).await })
            .await
    }

    pub async fn draw_next(&self, game_id: GameId, requester: PlayerId) -> Result<u8, EngineError> {
        self.with_game(game_id, |handle| async move {
            handle.draw_next(requester).await
        })
        .await
    }

    pub async fn claim_win(
        &self,
        game_id: GameId,
        card_id: CardId,
        claimant: PlayerId,
    ) -> Result<PayoutResult, EngineError> {
        self.with_game(game_id, |handle| async move {
            handle.claim_win(card_id, claimant).await
        })
        .await
    }

    /// Current state of a game.
    pub async fn game(&self, game_id: GameId) -> Result<Game, EngineError> {
        self.with_game(game_id, |handle| async move { handle.snapshot().await })
            .await
    }

    /// The cards `player` holds in a game.
    pub async fn cards_of(&self, game_id: GameId, player: PlayerId) -> Result<Vec<Card>, EngineError> {
        self.with_game(game_id, |handle| async move { handle.cards_of(player).await })
            .await
    }

    /// Starts delivering a game's events to `sender`. The first message
    /// is a snapshot.
    ///
    /// # Errors
    /// [`EngineError::AlreadyViewing`] if the viewer watches a game
    /// already; leave first to switch.
    pub async fn join(
        &self,
        viewer: ViewerId,
        game_id: GameId,
        sender: ViewerSender,
    ) -> Result<(), EngineError> {
        if self.viewers.read().await.contains_key(&viewer) {
            return Err(EngineError::AlreadyViewing(viewer));
        }

        self.with_game(game_id, |handle| {
            let sender = sender.clone();
            async move { handle.join(viewer, sender).await }
        })
        .await?;

        self.viewers.write().await.insert(viewer, game_id);
        Ok(())
    }

    /// Stops delivering events to `viewer`. Returns the game it watched.
    pub async fn leave(&self, viewer: ViewerId) -> Result<GameId, EngineError> {
        let game_id = self
            .viewers
            .write()
            .await
            .remove(&viewer)
            .ok_or(EngineError::NotViewing(viewer))?;

        // Never rehydrate just to leave: a game without an actor has no
        // viewers to remove.
        let handle = self.games.read().await.get(&game_id).cloned();
        if let Some(handle) = handle {
            match handle.leave(viewer).await {
                Ok(()) | Err(EngineError::NotViewing(_)) | Err(EngineError::RoomUnavailable(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(game_id)
    }

    /// The game a viewer is watching, if any.
    pub async fn viewing(&self, viewer: ViewerId) -> Option<GameId> {
        self.viewers.read().await.get(&viewer).copied()
    }

    /// IDs of games with a live actor.
    pub async fn active_games(&self) -> Vec<GameId> {
        self.games
            .read()
            .await
            .iter()
            .filter(|(_, handle)| !handle.is_closed())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Stops every actor. Games stay in the store and come back on next
    /// reference.
    pub async fn shutdown(&self) {
        let handles: Vec<GameHandle> = self.games.write().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            let _ = handle.shutdown().await;
        }
        self.viewers.write().await.clear();
        tracing::info!("registry shut down");
    }
}

/// Drops handles of actors that retired.
async fn reap_retired(games: GameMap, mut retired: mpsc::UnboundedReceiver<GameId>) {
    while let Some(game_id) = retired.recv().await {
        let mut games = games.write().await;
        if games.get(&game_id).is_some_and(GameHandle::is_closed) {
            games.remove(&game_id);
            tracing::debug!(%game_id, "retired game removed from registry");
        }
    }
}
