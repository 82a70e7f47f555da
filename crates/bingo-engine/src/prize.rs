//! Prize computation and settlement.
//!
//! A winning card can satisfy several categories at once; a full card
//! also completes every line. [`PrizeLedger::award`] reduces them to one
//! amount under the configured [`CategoryPolicy`], and
//! [`PrizeLedger::settle`] moves that amount into the claimant's wallet.
//!
//! # Ties
//!
//! When two satisfied categories carry the same share, the one listed
//! first in [`WinCategory`] is reported: line, then diagonal, then four
//! corners, then cross, then full card.

use bingo_protocol::{Card, Credits, Game, PlayerId, WinCategory};

use crate::config::BASIS_POINTS;
use crate::wallet::payout_key;
use crate::{CategoryPolicy, EngineError, GameStore, PrizeTable, Wallet};

/// What a winning card is paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Award {
    /// The category the amount was computed for.
    pub category: WinCategory,
    /// Every category the card satisfied.
    pub categories: Vec<WinCategory>,
    pub amount: Credits,
}

/// Turns satisfied categories into an amount and pays it out.
#[derive(Debug, Clone)]
pub struct PrizeLedger {
    table: PrizeTable,
    policy: CategoryPolicy,
}

impl PrizeLedger {
    pub fn new(table: PrizeTable, policy: CategoryPolicy) -> Self {
        Self { table, policy }
    }

    /// Computes the award for a card that satisfied `categories`.
    /// Returns `None` when nothing is satisfied.
    pub fn award(&self, pot: Credits, categories: Vec<WinCategory>) -> Option<Award> {
        let best = categories
            .iter()
            .copied()
            .min_by_key(|&c| (std::cmp::Reverse(self.table.basis_points(c)), priority(c)))?;

        let bp = match self.policy {
            CategoryPolicy::HighestTier => self.table.basis_points(best),
            CategoryPolicy::AllSatisfied => categories
                .iter()
                .map(|c| self.table.basis_points(*c))
                .sum::<u32>()
                .min(BASIS_POINTS),
        };

        Some(Award {
            category: best,
            categories,
            amount: share(pot, bp),
        })
    }

    /// Pays `amount` to `claimant` and persists the finished game with its
    /// winning card, as one unit.
    ///
    /// The credit goes first. If it fails nothing has changed. If the
    /// store then rejects the commit, the credit is reversed. Either
    /// failure is reported as [`EngineError::CollaboratorUnavailable`] and
    /// the caller keeps its in-memory state untouched.
    pub async fn settle<W: Wallet, S: GameStore>(
        &self,
        wallet: &W,
        store: &S,
        finished: &Game,
        winning_card: &Card,
        claimant: PlayerId,
        amount: Credits,
    ) -> Result<(), EngineError> {
        let key = payout_key(finished.id, winning_card.id);

        if amount > 0 {
            wallet.credit(claimant, amount, &key).await.map_err(|err| {
                tracing::warn!(
                    game_id = %finished.id,
                    card_id = %winning_card.id,
                    error = %err,
                    "payout credit failed"
                );
                EngineError::CollaboratorUnavailable(err.to_string())
            })?;
        }

        if let Err(err) = store
            .commit(finished, std::slice::from_ref(winning_card))
            .await
        {
            tracing::warn!(
                game_id = %finished.id,
                card_id = %winning_card.id,
                error = %err,
                "commit of finished game failed, reversing payout"
            );
            if amount > 0 {
                if let Err(reverse_err) = wallet.reverse(&key).await {
                    tracing::error!(
                        game_id = %finished.id,
                        %key,
                        error = %reverse_err,
                        "payout reversal failed"
                    );
                }
            }
            return Err(EngineError::CollaboratorUnavailable(err.to_string()));
        }

        Ok(())
    }
}

/// Position in the tie-break order. Lower wins.
fn priority(category: WinCategory) -> u8 {
    match category {
        WinCategory::Line => 0,
        WinCategory::Diagonal => 1,
        WinCategory::FourCorners => 2,
        WinCategory::Cross => 3,
        WinCategory::FullCard => 4,
    }
}

/// `pot * bp / 10_000`, rounded down.
fn share(pot: Credits, bp: u32) -> Credits {
    let amount = u128::from(pot) * u128::from(bp) / u128::from(BASIS_POINTS);
    // bp never exceeds BASIS_POINTS, so the result fits.
    Credits::try_from(amount).unwrap_or(pot)
}
