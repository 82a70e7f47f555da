//! Persistence of games and their cards.
//!
//! The engine treats the store as the source of truth. A live game actor
//! holds a copy of its record, but every change is committed here before
//! the actor applies it, so a game can be dropped from memory at any time
//! and loaded back later with [`GameStore::load_game`].
//!
//! Game ids come from the store too. A registry started against a store
//! that already holds games must not hand out an id that is taken.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use bingo_protocol::{Card, Game, GameId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{GameSettings, StoreError};

/// Everything needed to bring a game back to life.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGame {
    pub game: Game,
    pub settings: GameSettings,
    pub cards: Vec<Card>,
}

/// Durable record of games.
///
/// `commit` must write the game record and the given card records as
/// one unit: either all of them land or none do.
pub trait GameStore: Send + Sync + 'static {
    /// Reserves an id no stored game uses. Ids are never handed out twice.
    fn next_game_id(&self) -> impl Future<Output = Result<GameId, StoreError>> + Send;

    /// Stores a newly created game.
    ///
    /// # Errors
    /// [`StoreError::AlreadyExists`] if the id is taken.
    fn insert_game(&self, stored: &StoredGame) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Loads a game with its settings and cards, or `None`.
    fn load_game(
        &self,
        game_id: GameId,
    ) -> impl Future<Output = Result<Option<StoredGame>, StoreError>> + Send;

    /// Replaces the game record and upserts `cards` atomically.
    fn commit(&self, game: &Game, cards: &[Card]) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// A [`GameStore`] kept in process memory.
#[derive(Debug)]
pub struct InMemoryGameStore {
    games: RwLock<HashMap<GameId, StoredGame>>,
    /// Always past the highest id inserted or reserved.
    next_id: AtomicU64,
}

impl Default for InMemoryGameStore {
    fn default() -> Self {
        Self {
            games: RwLock::default(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }
}

impl GameStore for InMemoryGameStore {
    async fn next_game_id(&self) -> Result<GameId, StoreError> {
        Ok(GameId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn insert_game(&self, stored: &StoredGame) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        let id = stored.game.id;
        if games.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        self.next_id.fetch_max(id.0 + 1, Ordering::Relaxed);
        games.insert(id, stored.clone());
        Ok(())
    }

    async fn load_game(&self, game_id: GameId) -> Result<Option<StoredGame>, StoreError> {
        Ok(self.games.read().await.get(&game_id).cloned())
    }

    async fn commit(&self, game: &Game, cards: &[Card]) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        let stored = games
            .get_mut(&game.id)
            .ok_or(StoreError::NotFound(game.id))?;

        stored.game = game.clone();
        for card in cards {
            match stored.cards.iter_mut().find(|c| c.id == card.id) {
                Some(existing) => *existing = card.clone(),
                None => stored.cards.push(card.clone()),
            }
        }
        Ok(())
    }
}
