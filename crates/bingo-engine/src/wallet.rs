//! Account ledger the engine debits for cards and credits for prizes.
//!
//! The engine never stores balances itself. It calls a [`Wallet`] with
//! an idempotency key per transfer:
//!
//! - `purchase:<game>:<card>` when a card is bought
//! - `refund:<game>:<card>` when a cancelled game returns its price
//! - `payout:<game>:<card>` when a win is paid
//!
//! Replaying a key that is already applied is a no-op success, so a call
//! whose outcome was lost can simply be repeated.

use std::collections::HashMap;
use std::future::Future;

use bingo_protocol::{CardId, Credits, GameId, PlayerId};
use tokio::sync::Mutex;

use crate::WalletError;

/// Idempotency key for buying `card`.
pub fn purchase_key(game_id: GameId, card_id: CardId) -> String {
    format!("purchase:{}:{}", game_id.0, card_id.0)
}

/// Idempotency key for refunding `card` on cancel.
pub fn refund_key(game_id: GameId, card_id: CardId) -> String {
    format!("refund:{}:{}", game_id.0, card_id.0)
}

/// Idempotency key for paying out on `card`.
pub fn payout_key(game_id: GameId, card_id: CardId) -> String {
    format!("payout:{}:{}", game_id.0, card_id.0)
}

/// External account service.
///
/// `reverse` is the compensation hook: it undoes the transfer recorded
/// under a key. A reversed key may be applied again later, which is how
/// a failed settlement is retried.
pub trait Wallet: Send + Sync + 'static {
    /// Takes `amount` from `account`.
    ///
    /// # Errors
    /// - [`WalletError::InsufficientFunds`] if the balance is too low.
    /// - [`WalletError::Unavailable`] if the service cannot be reached.
    fn debit(
        &self,
        account: PlayerId,
        amount: Credits,
        key: &str,
    ) -> impl Future<Output = Result<(), WalletError>> + Send;

    /// Adds `amount` to `account`.
    fn credit(
        &self,
        account: PlayerId,
        amount: Credits,
        key: &str,
    ) -> impl Future<Output = Result<(), WalletError>> + Send;

    /// Undoes the transfer recorded under `key`. Reversing twice is a
    /// no-op.
    fn reverse(&self, key: &str) -> impl Future<Output = Result<(), WalletError>> + Send;
}

// ---------------------------------------------------------------------------
// InMemoryWallet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Debit,
    Credit,
}

#[derive(Debug, Clone)]
struct Transfer {
    account: PlayerId,
    amount: Credits,
    direction: Direction,
    reversed: bool,
}

#[derive(Debug, Default)]
struct Book {
    balances: HashMap<PlayerId, Credits>,
    transfers: HashMap<String, Transfer>,
}

impl Book {
    fn apply(
        &mut self,
        account: PlayerId,
        amount: Credits,
        direction: Direction,
        key: &str,
    ) -> Result<(), WalletError> {
        if let Some(existing) = self.transfers.get(key) {
            if !existing.reversed {
                return Ok(());
            }
        }

        let balance = self.balances.entry(account).or_insert(0);
        match direction {
            Direction::Debit => {
                if *balance < amount {
                    return Err(WalletError::InsufficientFunds {
                        available: *balance,
                        required: amount,
                    });
                }
                *balance -= amount;
            }
            Direction::Credit => *balance += amount,
        }

        self.transfers.insert(
            key.to_owned(),
            Transfer {
                account,
                amount,
                direction,
                reversed: false,
            },
        );
        Ok(())
    }
}

/// A process-local [`Wallet`]. Used by the demo and by tests.
#[derive(Debug, Default)]
pub struct InMemoryWallet {
    book: Mutex<Book>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tops up an account outside the keyed ledger.
    pub async fn deposit(&self, account: PlayerId, amount: Credits) {
        let mut book = self.book.lock().await;
        *book.balances.entry(account).or_insert(0) += amount;
    }

    pub async fn balance(&self, account: PlayerId) -> Credits {
        let book = self.book.lock().await;
        book.balances.get(&account).copied().unwrap_or(0)
    }

    /// Whether a transfer under `key` is currently applied.
    pub async fn is_applied(&self, key: &str) -> bool {
        let book = self.book.lock().await;
        book.transfers.get(key).is_some_and(|t| !t.reversed)
    }
}

impl Wallet for InMemoryWallet {
    async fn debit(&self, account: PlayerId, amount: Credits, key: &str) -> Result<(), WalletError> {
        self.book
            .lock()
            .await
            .apply(account, amount, Direction::Debit, key)
    }

    async fn credit(&self, account: PlayerId, amount: Credits, key: &str) -> Result<(), WalletError> {
        self.book
            .lock()
            .await
            .apply(account, amount, Direction::Credit, key)
    }

    async fn reverse(&self, key: &str) -> Result<(), WalletError> {
        let mut book = self.book.lock().await;
        let Book {
            balances,
            transfers,
        } = &mut *book;

        let transfer = transfers
            .get_mut(key)
            .ok_or_else(|| WalletError::UnknownTransfer(key.to_owned()))?;
        if transfer.reversed {
            return Ok(());
        }

        let balance = balances.entry(transfer.account).or_insert(0);
        match transfer.direction {
            Direction::Debit => *balance += transfer.amount,
            Direction::Credit => *balance = balance.saturating_sub(transfer.amount),
        }
        transfer.reversed = true;
        tracing::debug!(key, account = %transfer.account, "transfer reversed");
        Ok(())
    }
}
