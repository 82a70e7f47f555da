//! Game actor: one Tokio task per live game.
//!
//! The actor owns the game record, its cards, its draw pool and its
//! viewers. Every mutating operation is a [`GameCommand`] processed one
//! at a time, in arrival order, so concurrent purchases, draws and
//! claims on one game never interleave.
//!
//! Each mutation follows the same three steps: build the next record,
//! commit it to the store, then apply it in memory and publish events.
//! A failed commit leaves the in-memory game exactly as it was.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bingo_protocol::{
    Card, CardId, Game, GameId, GameStatus, Grid, PayoutResult, PlayerId, RoomEvent, ViewerId,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::broadcast::{RoomBroadcaster, ViewerSender};
use crate::card::CardGenerator;
use crate::draw::DrawEngine;
use crate::error::GameAction;
use crate::pattern::{DrawnNumbers, PatternValidator};
use crate::prize::PrizeLedger;
use crate::store::StoredGame;
use crate::wallet::{purchase_key, refund_key};
use crate::{EngineConfig, EngineError, GameSettings, GameStore, StoreError, Wallet, WalletError};

/// Counter for card ids. Bumped past any id seen on rehydration.
static NEXT_CARD_ID: AtomicU64 = AtomicU64::new(1);

/// How long an expired game waits before retrying a cancel that failed.
const EXPIRY_RETRY: Duration = Duration::from_secs(30);

/// Unix milliseconds.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// How the grid of a purchased card is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardChoice {
    /// Generate a random card.
    Random,
    /// Use the player's grid, after validation.
    Chosen(Grid),
}

impl From<Option<Grid>> for CardChoice {
    fn from(grid: Option<Grid>) -> Self {
        grid.map_or(Self::Random, Self::Chosen)
    }
}

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Requests a game actor processes, each with its reply channel.
pub(crate) enum GameCommand {
    Join {
        viewer: ViewerId,
        sender: ViewerSender,
        reply: Reply<()>,
    },
    Leave {
        viewer: ViewerId,
        reply: Reply<()>,
    },
    Purchase {
        buyer: PlayerId,
        choice: CardChoice,
        reply: Reply<Card>,
    },
    Start {
        requester: PlayerId,
        reply: Reply<Game>,
    },
    Cancel {
        requester: PlayerId,
        reply: Reply<Game>,
    },
    DrawNext {
        requester: PlayerId,
        reply: Reply<u8>,
    },
    ClaimWin {
        card_id: CardId,
        claimant: PlayerId,
        reply: Reply<PayoutResult>,
    },
    Snapshot {
        reply: Reply<Game>,
    },
    CardsOf {
        player: PlayerId,
        reply: Reply<Vec<Card>>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// GameHandle
// ---------------------------------------------------------------------------

/// Handle to a running game actor. Cheap to clone.
#[derive(Clone)]
pub struct GameHandle {
    game_id: GameId,
    sender: mpsc::Sender<GameCommand>,
}

impl GameHandle {
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// `true` once the actor stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> GameCommand,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::RoomUnavailable(self.game_id))?;
        reply_rx
            .await
            .map_err(|_| EngineError::RoomUnavailable(self.game_id))?
    }

    pub async fn join(&self, viewer: ViewerId, sender: ViewerSender) -> Result<(), EngineError> {
        self.request(|reply| GameCommand::Join {
            viewer,
            sender,
            reply,
        })
        .await
    }

    pub async fn leave(&self, viewer: ViewerId) -> Result<(), EngineError> {
        self.request(|reply| GameCommand::Leave { viewer, reply })
            .await
    }

    pub async fn purchase(&self, buyer: PlayerId, choice: CardChoice) -> Result<Card, EngineError> {
        self.request(|reply| GameCommand::Purchase {
            buyer,
            choice,
            reply,
        })
        .await
    }

    pub async fn start(&self, requester: PlayerId) -> Result<Game, EngineError> {
        self.request(|reply| GameCommand::Start { requester, reply })
            .await
    }

    pub async fn cancel(&self, requester: PlayerId) -> Result<Game, EngineError> {
        self.request(|reply| GameCommand::Cancel { requester, reply })
            .await
    }

    pub async fn draw_next(&self, requester: PlayerId) -> Result<u8, EngineError> {
        self.request(|reply| GameCommand::DrawNext { requester, reply })
            .await
    }

    pub async fn claim_win(
        &self,
        card_id: CardId,
        claimant: PlayerId,
    ) -> Result<PayoutResult, EngineError> {
        self.request(|reply| GameCommand::ClaimWin {
            card_id,
            claimant,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<Game, EngineError> {
        self.request(|reply| GameCommand::Snapshot { reply }).await
    }

    pub async fn cards_of(&self, player: PlayerId) -> Result<Vec<Card>, EngineError> {
        self.request(|reply| GameCommand::CardsOf { player, reply })
            .await
    }

    /// Stops the actor. Queued commands are answered with
    /// [`EngineError::RoomUnavailable`].
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.sender
            .send(GameCommand::Shutdown)
            .await
            .map_err(|_| EngineError::RoomUnavailable(self.game_id))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Shared collaborators every game actor is spawned with.
pub(crate) struct GameContext<W, S> {
    pub wallet: Arc<W>,
    pub store: Arc<S>,
    pub config: Arc<EngineConfig>,
    /// Receives a game's id when its actor retires.
    pub retired: mpsc::UnboundedSender<GameId>,
}

impl<W, S> Clone for GameContext<W, S> {
    fn clone(&self) -> Self {
        Self {
            wallet: Arc::clone(&self.wallet),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            retired: self.retired.clone(),
        }
    }
}

struct GameActor<W, S> {
    game: Game,
    settings: GameSettings,
    cards: Vec<Card>,
    draws: DrawEngine,
    drawn: DrawnNumbers,
    validator: PatternValidator,
    ledger: PrizeLedger,
    creator_may_buy: bool,
    room: RoomBroadcaster,
    rng: StdRng,
    ctx: GameContext<W, S>,
    receiver: mpsc::Receiver<GameCommand>,

    expires_at: Option<Instant>,
    autostart_at: Option<Instant>,
    next_draw_at: Option<Instant>,
    retire_at: Option<Instant>,
}

/// Sleeps until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn store_failure(err: StoreError) -> EngineError {
    EngineError::CollaboratorUnavailable(err.to_string())
}

impl<W: Wallet, S: GameStore> GameActor<W, S> {
    async fn run(mut self) {
        tracing::info!(
            game_id = %self.game.id,
            status = %self.game.status,
            "game actor started"
        );

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(GameCommand::Shutdown) | None => {
                            tracing::info!(game_id = %self.game.id, "game actor shutting down");
                            break;
                        }
                        Some(cmd) => self.handle(cmd).await,
                    }
                }
                () = sleep_until(deadline) => {
                    if self.on_timer().await {
                        self.retire().await;
                        break;
                    }
                }
            }

            // Terminal games keep a retirement deadline armed; `on_timer`
            // re-checks the room when it fires.
            if self.game.status.is_terminal() {
                self.room.prune();
                if self.retire_at.is_none() {
                    self.retire_at = Some(Instant::now() + self.ctx.config.retire_after);
                }
            } else {
                self.retire_at = None;
            }
        }

        let _ = self.ctx.retired.send(self.game.id);
        tracing::info!(game_id = %self.game.id, "game actor stopped");
    }

    /// Stops accepting commands, then answers everything already queued.
    /// A join is turned away so the caller lands on a fresh actor.
    async fn retire(&mut self) {
        self.receiver.close();
        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                GameCommand::Join { reply, .. } => {
                    let _ = reply.send(Err(EngineError::RoomUnavailable(self.game.id)));
                }
                GameCommand::Shutdown => {}
                cmd => self.handle(cmd).await,
            }
        }
        tracing::debug!(game_id = %self.game.id, "game retired");
    }

    async fn handle(&mut self, cmd: GameCommand) {
        match cmd {
            GameCommand::Join {
                viewer,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_join(viewer, sender));
            }
            GameCommand::Leave { viewer, reply } => {
                let _ = reply.send(self.handle_leave(viewer));
            }
            GameCommand::Purchase {
                buyer,
                choice,
                reply,
            } => {
                let result = self.handle_purchase(buyer, choice).await;
                let _ = reply.send(result);
            }
            GameCommand::Start { requester, reply } => {
                let result = match self.require_creator(requester) {
                    Ok(()) => self.begin().await,
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            GameCommand::Cancel { requester, reply } => {
                let result = match self.require_creator(requester) {
                    Ok(()) => self.cancel_with_refunds().await,
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            GameCommand::DrawNext { requester, reply } => {
                let result = match self.require_creator(requester) {
                    Ok(()) => self.draw().await,
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            GameCommand::ClaimWin {
                card_id,
                claimant,
                reply,
            } => {
                let result = self.handle_claim(card_id, claimant).await;
                let _ = reply.send(result);
            }
            GameCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.game.clone()));
            }
            GameCommand::CardsOf { player, reply } => {
                let cards = self
                    .cards
                    .iter()
                    .filter(|c| c.owner == player)
                    .cloned()
                    .collect();
                let _ = reply.send(Ok(cards));
            }
            GameCommand::Shutdown => {}
        }
    }

    fn require_creator(&self, requester: PlayerId) -> Result<(), EngineError> {
        if requester == self.game.creator {
            Ok(())
        } else {
            Err(EngineError::NotCreator(requester))
        }
    }

    fn snapshot_event(&self) -> RoomEvent {
        RoomEvent::Snapshot {
            status: self.game.status,
            drawn_numbers: self.game.drawn_numbers.clone(),
            sold_tickets: self.game.sold_cards,
            pot: self.game.pot,
        }
    }

    // -- viewers ------------------------------------------------------------

    fn handle_join(&mut self, viewer: ViewerId, sender: ViewerSender) -> Result<(), EngineError> {
        if self.room.contains(viewer) {
            return Err(EngineError::AlreadyViewing(viewer));
        }
        let snapshot = self.snapshot_event();
        if self.room.join(viewer, sender, snapshot) {
            tracing::debug!(
                game_id = %self.game.id,
                %viewer,
                viewers = self.room.viewer_count(),
                seq = self.room.seq(),
                "viewer joined"
            );
        }
        Ok(())
    }

    fn handle_leave(&mut self, viewer: ViewerId) -> Result<(), EngineError> {
        if !self.room.leave(viewer) {
            return Err(EngineError::NotViewing(viewer));
        }
        tracing::debug!(
            game_id = %self.game.id,
            %viewer,
            viewers = self.room.viewer_count(),
            "viewer left"
        );
        Ok(())
    }

    // -- purchase -----------------------------------------------------------

    async fn handle_purchase(
        &mut self,
        buyer: PlayerId,
        choice: CardChoice,
    ) -> Result<Card, EngineError> {
        let status = self.game.status;
        if !status.accepts_purchases() {
            return Err(EngineError::InvalidTransition {
                action: GameAction::Purchase,
                status,
            });
        }
        if buyer == self.game.creator && !self.creator_may_buy {
            return Err(EngineError::CreatorCannotPlay);
        }
        if self.game.sold_cards >= self.settings.max_cards {
            return Err(EngineError::GameFull(self.game.id));
        }
        let held = self.cards.iter().filter(|c| c.owner == buyer).count() as u32;
        if held >= self.settings.max_cards_per_player {
            return Err(EngineError::CardLimit {
                player: buyer,
                limit: self.settings.max_cards_per_player,
            });
        }

        let grid = match choice {
            CardChoice::Random => CardGenerator::generate(&mut self.rng),
            CardChoice::Chosen(grid) => {
                CardGenerator::validate(&grid)?;
                grid
            }
        };
        let card = Card {
            id: CardId(NEXT_CARD_ID.fetch_add(1, Ordering::Relaxed)),
            game_id: self.game.id,
            owner: buyer,
            grid,
            price: self.game.card_price,
            is_winner: false,
            refunded: false,
            payout: 0,
        };

        let key = purchase_key(self.game.id, card.id);
        match self.ctx.wallet.debit(buyer, card.price, &key).await {
            Ok(()) => {}
            Err(err @ WalletError::InsufficientFunds { .. }) => return Err(err.into()),
            Err(err) => {
                // The debit may have landed even though the reply did not.
                tracing::warn!(
                    game_id = %self.game.id,
                    card_id = %card.id,
                    error = %err,
                    "purchase debit failed, reversing"
                );
                match self.ctx.wallet.reverse(&key).await {
                    Ok(()) | Err(WalletError::UnknownTransfer(_)) => {}
                    Err(reverse_err) => {
                        tracing::error!(%key, error = %reverse_err, "purchase reversal failed");
                    }
                }
                return Err(err.into());
            }
        }

        let mut next = self.game.clone();
        next.pot += card.price;
        next.sold_cards += 1;
        if next.status == GameStatus::Open && next.sold_cards >= self.settings.min_cards {
            next.status = GameStatus::Ready;
        }

        if let Err(err) = self
            .ctx
            .store
            .commit(&next, std::slice::from_ref(&card))
            .await
        {
            tracing::warn!(
                game_id = %self.game.id,
                card_id = %card.id,
                error = %err,
                "purchase commit failed, reversing debit"
            );
            if let Err(reverse_err) = self.ctx.wallet.reverse(&key).await {
                tracing::error!(%key, error = %reverse_err, "purchase reversal failed");
            }
            return Err(store_failure(err));
        }

        let became_ready = next.status != self.game.status;
        self.game = next;
        self.cards.push(card.clone());

        tracing::info!(
            game_id = %self.game.id,
            player_id = %buyer,
            card_id = %card.id,
            sold = self.game.sold_cards,
            "card purchased"
        );
        if became_ready {
            tracing::info!(game_id = %self.game.id, "minimum reached, game ready");
            self.expires_at = None;
        }
        self.arm_autostart();

        self.room.publish(vec![RoomEvent::PlayerJoined {
            player_id: buyer,
            sold_tickets: self.game.sold_cards,
        }]);
        Ok(card)
    }

    // -- start --------------------------------------------------------------

    async fn begin(&mut self) -> Result<Game, EngineError> {
        let status = self.game.status;
        if !matches!(status, GameStatus::Open | GameStatus::Ready) {
            return Err(EngineError::InvalidTransition {
                action: GameAction::Start,
                status,
            });
        }
        if self.game.sold_cards < self.settings.min_cards {
            return Err(EngineError::MinimumNotMet {
                required: self.settings.min_cards,
                sold: self.game.sold_cards,
            });
        }

        let mut next = self.game.clone();
        next.status = GameStatus::Running;
        next.started_at = Some(now_ms());
        self.ctx
            .store
            .commit(&next, &[])
            .await
            .map_err(store_failure)?;

        self.game = next;
        self.autostart_at = None;
        self.expires_at = None;
        self.arm_auto_draw();

        tracing::info!(
            game_id = %self.game.id,
            sold = self.game.sold_cards,
            pot = self.game.pot,
            "game started"
        );
        self.room.publish(vec![RoomEvent::Started]);
        Ok(self.game.clone())
    }

    // -- cancel -------------------------------------------------------------

    async fn cancel_with_refunds(&mut self) -> Result<Game, EngineError> {
        let status = self.game.status;
        if !status.can_transition_to(GameStatus::Cancelled) {
            return Err(EngineError::InvalidTransition {
                action: GameAction::Cancel,
                status,
            });
        }

        let mut refunded: Vec<Card> = Vec::new();
        let mut applied: Vec<String> = Vec::new();
        for card in self.cards.iter().filter(|c| !c.refunded) {
            let key = refund_key(self.game.id, card.id);
            if let Err(err) = self.ctx.wallet.credit(card.owner, card.price, &key).await {
                tracing::warn!(
                    game_id = %self.game.id,
                    card_id = %card.id,
                    error = %err,
                    "refund failed, rolling back cancel"
                );
                self.reverse_all(&applied).await;
                return Err(EngineError::CollaboratorUnavailable(err.to_string()));
            }
            applied.push(key);
            let mut card = card.clone();
            card.refunded = true;
            refunded.push(card);
        }

        let mut next = self.game.clone();
        next.status = GameStatus::Cancelled;
        next.ended_at = Some(now_ms());

        if let Err(err) = self.ctx.store.commit(&next, &refunded).await {
            tracing::warn!(
                game_id = %self.game.id,
                error = %err,
                "cancel commit failed, reversing refunds"
            );
            self.reverse_all(&applied).await;
            return Err(store_failure(err));
        }

        let refunded_count = refunded.len() as u32;
        for card in refunded {
            if let Some(slot) = self.cards.iter_mut().find(|c| c.id == card.id) {
                *slot = card;
            }
        }
        self.game = next;
        self.autostart_at = None;
        self.expires_at = None;

        tracing::info!(game_id = %self.game.id, refunded_count, "game cancelled");
        self.room.publish(vec![RoomEvent::Cancelled { refunded_count }]);
        Ok(self.game.clone())
    }

    async fn reverse_all(&self, keys: &[String]) {
        for key in keys {
            if let Err(err) = self.ctx.wallet.reverse(key).await {
                tracing::error!(%key, error = %err, "refund reversal failed");
            }
        }
    }

    // -- draw ---------------------------------------------------------------

    async fn draw(&mut self) -> Result<u8, EngineError> {
        let status = self.game.status;
        if status != GameStatus::Running {
            return Err(EngineError::InvalidTransition {
                action: GameAction::Draw,
                status,
            });
        }
        let number = self.draws.select(&mut self.rng)?;

        let mut next = self.game.clone();
        next.drawn_numbers.push(number);
        self.ctx
            .store
            .commit(&next, &[])
            .await
            .map_err(store_failure)?;

        self.draws.record(number);
        self.drawn.insert(number);
        self.game = next;

        let drawn_count = self.game.drawn_numbers.len() as u32;
        tracing::debug!(
            game_id = %self.game.id,
            number,
            drawn_count,
            remaining = self.draws.remaining().len(),
            "number drawn"
        );
        self.room
            .publish(vec![RoomEvent::NumberDrawn { number, drawn_count }]);
        Ok(number)
    }

    // -- claim --------------------------------------------------------------

    async fn handle_claim(
        &mut self,
        card_id: CardId,
        claimant: PlayerId,
    ) -> Result<PayoutResult, EngineError> {
        match self.game.status {
            GameStatus::Running => {}
            GameStatus::Finished if self.game.winner.is_some() => {
                tracing::debug!(
                    game_id = %self.game.id,
                    card_id = %card_id,
                    player_id = %claimant,
                    "late claim rejected"
                );
                return Err(EngineError::AlreadyDecided(self.game.id));
            }
            status => {
                return Err(EngineError::InvalidTransition {
                    action: GameAction::Claim,
                    status,
                });
            }
        }

        let card = self
            .cards
            .iter()
            .find(|c| c.id == card_id)
            .ok_or(EngineError::UnknownCard(card_id))?;
        if card.owner != claimant {
            return Err(EngineError::NotCardOwner {
                card: card_id,
                player: claimant,
            });
        }
        if !self.validator.is_winner(&card.grid, &self.drawn) {
            return Err(EngineError::NoWinningPattern(card_id));
        }
        let categories = self.validator.satisfied_categories(&card.grid, &self.drawn);
        let award = self
            .ledger
            .award(self.game.pot, categories)
            .ok_or(EngineError::NoWinningPattern(card_id))?;

        let mut next = self.game.clone();
        next.status = GameStatus::Finished;
        next.winner = Some(card_id);
        next.ended_at = Some(now_ms());

        let mut winning = card.clone();
        winning.is_winner = true;
        winning.payout = award.amount;

        self.ledger
            .settle(
                &*self.ctx.wallet,
                &*self.ctx.store,
                &next,
                &winning,
                claimant,
                award.amount,
            )
            .await?;

        self.game = next;
        if let Some(slot) = self.cards.iter_mut().find(|c| c.id == card_id) {
            *slot = winning;
        }
        self.next_draw_at = None;

        tracing::info!(
            game_id = %self.game.id,
            card_id = %card_id,
            player_id = %claimant,
            category = %award.category,
            amount = award.amount,
            "winner paid"
        );
        self.room.publish(vec![
            RoomEvent::Winner {
                card_id,
                claimant_id: claimant,
                category: award.category,
                amount: award.amount,
            },
            RoomEvent::Finished,
        ]);

        Ok(PayoutResult {
            game_id: self.game.id,
            card_id,
            claimant,
            category: award.category,
            categories: award.categories,
            amount: award.amount,
        })
    }

    // -- timers -------------------------------------------------------------

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.expires_at,
            self.autostart_at,
            self.next_draw_at,
            self.retire_at,
        ]
            .into_iter()
            .flatten()
            .min()
    }

    fn arm_autostart(&mut self) {
        let Some(policy) = self.settings.autostart else {
            return;
        };
        if self.autostart_at.is_none()
            && self.game.status == GameStatus::Ready
            && self.game.sold_cards >= policy.threshold
        {
            self.autostart_at = Some(Instant::now() + policy.delay);
            tracing::debug!(
                game_id = %self.game.id,
                delay_ms = policy.delay.as_millis() as u64,
                "autostart armed"
            );
        }
    }

    fn arm_auto_draw(&mut self) {
        self.next_draw_at = match self.settings.auto_draw_interval {
            Some(interval)
                if self.game.status == GameStatus::Running && !self.draws.is_exhausted() =>
            {
                Some(Instant::now() + interval)
            }
            _ => None,
        };
    }

    /// Fires every timer that is due. Returns `true` when the actor
    /// should retire.
    async fn on_timer(&mut self) -> bool {
        let now = Instant::now();

        if self.retire_at.is_some_and(|at| at <= now) {
            // Receivers dropped without a leave only show up here.
            self.room.prune();
            if self.room.is_empty() {
                return true;
            }
            tracing::debug!(
                game_id = %self.game.id,
                viewers = self.room.viewer_count(),
                "viewers remain, retirement deferred"
            );
            self.retire_at = Some(now + self.ctx.config.retire_after);
        }

        if self.expires_at.is_some_and(|at| at <= now) {
            self.expires_at = None;
            if self.game.status == GameStatus::Open {
                match self.cancel_with_refunds().await {
                    Ok(_) => tracing::info!(game_id = %self.game.id, "game expired"),
                    Err(err) => {
                        tracing::warn!(game_id = %self.game.id, error = %err, "expiry cancel failed");
                        self.expires_at = Some(now + EXPIRY_RETRY);
                    }
                }
            }
        }

        if self.autostart_at.is_some_and(|at| at <= now) {
            self.autostart_at = None;
            if let Err(err) = self.begin().await {
                tracing::warn!(game_id = %self.game.id, error = %err, "autostart failed");
            }
        }

        if self.next_draw_at.is_some_and(|at| at <= now) {
            self.next_draw_at = None;
            match self.draw().await {
                Ok(_) => {}
                Err(EngineError::PoolExhausted) => {
                    tracing::info!(game_id = %self.game.id, "pool exhausted, auto-draw stopped");
                }
                Err(err) => {
                    tracing::warn!(game_id = %self.game.id, error = %err, "auto-draw failed");
                }
            }
            self.arm_auto_draw();
        }
        false
    }
}

/// Spawns an actor for a stored game and returns its handle.
pub(crate) fn spawn_game<W: Wallet, S: GameStore>(
    stored: StoredGame,
    ctx: GameContext<W, S>,
) -> GameHandle {
    let StoredGame {
        game,
        settings,
        cards,
    } = stored;
    let game_id = game.id;
    let config = Arc::clone(&ctx.config);
    let (tx, rx) = mpsc::channel(config.channel_size);

    if let Some(max_id) = cards.iter().map(|c| c.id.0).max() {
        NEXT_CARD_ID.fetch_max(max_id + 1, Ordering::Relaxed);
    }

    let rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ game_id.0),
        None => StdRng::from_os_rng(),
    };

    let now = Instant::now();
    let expires_at = match settings.expire_after {
        Some(window) if game.status == GameStatus::Open => {
            let age = Duration::from_millis(now_ms().saturating_sub(game.created_at));
            Some(now + window.saturating_sub(age))
        }
        _ => None,
    };

    let draws = DrawEngine::resume(&game.drawn_numbers);
    let mut actor = GameActor {
        drawn: DrawnNumbers::from(draws.drawn()),
        draws,
        validator: PatternValidator::standard(config.supplementary_patterns),
        ledger: PrizeLedger::new(config.prize_table, config.category_policy),
        creator_may_buy: config.creator_may_buy,
        room: RoomBroadcaster::new(game_id),
        rng,
        ctx,
        receiver: rx,
        expires_at,
        autostart_at: None,
        next_draw_at: None,
        retire_at: None,
        game,
        settings,
        cards,
    };
    actor.arm_autostart();
    actor.arm_auto_draw();
    if actor.game.status.is_terminal() {
        actor.retire_at = Some(now + config.retire_after);
    }

    tokio::spawn(actor.run());

    GameHandle {
        game_id,
        sender: tx,
    }
}
