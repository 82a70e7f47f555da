//! Engine-wide and per-game configuration.

use std::time::Duration;

use bingo_protocol::{Credits, WinCategory};
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Denominator of every prize fraction: 10 000 bp is the whole pot.
pub const BASIS_POINTS: u32 = 10_000;

// ---------------------------------------------------------------------------
// PrizeTable
// ---------------------------------------------------------------------------

/// Share of the pot paid per win category, in basis points.
///
/// The table may sum to at most [`BASIS_POINTS`]; whatever is left of
/// the pot after a payout is kept as commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTable {
    pub line: u32,
    pub diagonal: u32,
    pub four_corners: u32,
    pub cross: u32,
    pub full_card: u32,
}

impl PrizeTable {
    /// The share configured for `category`.
    pub fn basis_points(&self, category: WinCategory) -> u32 {
        match category {
            WinCategory::Line => self.line,
            WinCategory::Diagonal => self.diagonal,
            WinCategory::FourCorners => self.four_corners,
            WinCategory::Cross => self.cross,
            WinCategory::FullCard => self.full_card,
        }
    }

    /// Sum of every tier.
    pub fn total(&self) -> u32 {
        WinCategory::ALL
            .iter()
            .map(|c| self.basis_points(*c))
            .sum()
    }
}

impl Default for PrizeTable {
    /// 10 % of every pot is commission; the rest is split into tiers.
    fn default() -> Self {
        Self {
            line: 2_000,
            diagonal: 1_200,
            four_corners: 800,
            cross: 1_000,
            full_card: 4_000,
        }
    }
}

/// How a card that satisfies several categories at once is paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryPolicy {
    /// Pay only the satisfied category with the largest share.
    #[default]
    HighestTier,
    /// Pay the sum of every satisfied category's share, capped at the
    /// whole pot.
    AllSatisfied,
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Settings shared by every game in a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub prize_table: PrizeTable,
    pub category_policy: CategoryPolicy,

    /// Enables the four-corners and cross patterns.
    pub supplementary_patterns: bool,

    /// Whether a game's creator may buy cards in it.
    pub creator_may_buy: bool,

    /// Cheapest allowed card, in minor units.
    pub min_card_price: Credits,

    /// Card prices must be a multiple of this.
    pub price_step: Credits,

    /// Capacity of each game actor's command queue.
    pub channel_size: usize,

    /// How long the actor of a finished or cancelled game with no
    /// viewers lingers before it retires.
    pub retire_after: Duration,

    /// Seeds every game's RNG when set. Tests and replays only.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prize_table: PrizeTable::default(),
            category_policy: CategoryPolicy::HighestTier,
            supplementary_patterns: true,
            creator_may_buy: false,
            min_card_price: 50,
            price_step: 50,
            channel_size: 64,
            retire_after: Duration::from_secs(5),
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    /// Checks the configuration and hands it back if it is usable.
    ///
    /// # Errors
    /// [`EngineError::InvalidSettings`] if the prize table pays out more
    /// than the pot, or a size/price knob is zero.
    pub fn validated(self) -> Result<Self, EngineError> {
        let total = self.prize_table.total();
        if total > BASIS_POINTS {
            return Err(EngineError::InvalidSettings(format!(
                "prize table sums to {total} bp, more than {BASIS_POINTS}"
            )));
        }
        if self.channel_size == 0 {
            return Err(EngineError::InvalidSettings(
                "channel_size must be positive".into(),
            ));
        }
        if self.price_step == 0 || self.min_card_price == 0 {
            return Err(EngineError::InvalidSettings(
                "card prices must be positive".into(),
            ));
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// GameSettings
// ---------------------------------------------------------------------------

/// Start a game automatically once enough cards are sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutostartPolicy {
    /// Sold cards needed before the countdown begins.
    pub threshold: u32,
    /// Countdown length once the threshold is reached.
    pub delay: Duration,
}

/// Settings chosen by the creator of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    pub card_price: Credits,

    /// Cards that must be sold before the game can start. A game with
    /// minimum 0 is created `READY`.
    pub min_cards: u32,

    /// Total cards the game will sell.
    pub max_cards: u32,

    pub max_cards_per_player: u32,

    pub autostart: Option<AutostartPolicy>,

    /// Draw a number on this cadence while running.
    pub auto_draw_interval: Option<Duration>,

    /// Cancel and refund an `OPEN` game that is still short of its
    /// minimum this long after creation.
    pub expire_after: Option<Duration>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            card_price: 100,
            min_cards: 2,
            max_cards: 100,
            max_cards_per_player: 2,
            autostart: None,
            auto_draw_interval: None,
            expire_after: None,
        }
    }
}

impl GameSettings {
    /// Checks these settings against the engine's price rules.
    pub fn validate(&self, config: &EngineConfig) -> Result<(), EngineError> {
        let invalid = |msg: String| Err(EngineError::InvalidSettings(msg));

        if self.card_price < config.min_card_price {
            return invalid(format!(
                "card price {} is below the minimum {}",
                self.card_price, config.min_card_price
            ));
        }
        if self.card_price % config.price_step != 0 {
            return invalid(format!(
                "card price {} is not a multiple of {}",
                self.card_price, config.price_step
            ));
        }
        if self.max_cards == 0 || self.min_cards > self.max_cards {
            return invalid(format!(
                "card limits {}..={} are empty",
                self.min_cards, self.max_cards
            ));
        }
        if self.max_cards_per_player == 0 {
            return invalid("max_cards_per_player must be positive".into());
        }
        if let Some(policy) = self.autostart {
            if policy.threshold == 0 || policy.threshold > self.max_cards {
                return invalid(format!(
                    "autostart threshold {} is outside 1..={}",
                    policy.threshold, self.max_cards
                ));
            }
        }
        if self.auto_draw_interval == Some(Duration::ZERO) {
            return invalid("auto_draw_interval must be positive".into());
        }
        Ok(())
    }
}
