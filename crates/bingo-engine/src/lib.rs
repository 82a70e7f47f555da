//! The bingo game engine.
//!
//! Every live game runs as its own Tokio task (actor) that owns the
//! game's state, draw pool and viewers. Games never share locks: two
//! games progress fully in parallel, while all actions on one game are
//! processed one at a time.
//!
//! # Key types
//!
//! - [`GameRegistry`]: creates games and routes actions to their actors
//! - [`GameHandle`]: sends commands to one running actor
//! - [`CardGenerator`], [`DrawEngine`], [`PatternValidator`],
//!   [`PrizeLedger`]: the pure game rules
//! - [`Wallet`], [`GameStore`]: the collaborators an embedding provides
//! - [`EngineConfig`], [`GameSettings`]: configuration

mod broadcast;
mod card;
mod config;
mod draw;
mod error;
mod game;
mod pattern;
mod prize;
mod registry;
mod store;
mod wallet;

pub use broadcast::{RoomBroadcaster, ViewerSender};
pub use card::{CardGenerator, column_band};
pub use config::{AutostartPolicy, BASIS_POINTS, CategoryPolicy, EngineConfig, GameSettings, PrizeTable};
pub use draw::DrawEngine;
pub use error::{EngineError, GameAction, StoreError, WalletError};
pub use game::{CardChoice, GameHandle};
pub use pattern::{DrawnNumbers, Pattern, PatternValidator};
pub use prize::{Award, PrizeLedger};
pub use registry::GameRegistry;
pub use store::{GameStore, InMemoryGameStore, StoredGame};
pub use wallet::{InMemoryWallet, Wallet, payout_key, purchase_key, refund_key};
