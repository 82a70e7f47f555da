//! Messages exchanged between a room and its viewers.
//!
//! Three directions of traffic share one [`Envelope`]:
//!
//! - [`RoomAction`]: a client asks the room to do something.
//! - [`ActionReply`]: the direct answer to one action, sent only to the
//!   requester.
//! - [`RoomMessage`]: an event broadcast to every viewer of a room,
//!   stamped with the room's sequence number.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::types::{
    Card, CardId, Credits, Game, GameId, GameStatus, Grid, PayoutResult,
    PlayerId, WinCategory,
};

// ---------------------------------------------------------------------------
// Room events (server → every viewer)
// ---------------------------------------------------------------------------

/// A state change broadcast to everyone watching a game.
///
/// Internally tagged, so `NumberDrawn` encodes as
/// `{ "type": "number_drawn", "number": 42, "drawn_count": 3 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    /// Sent to a single viewer right after it joins.
    Snapshot {
        status: GameStatus,
        drawn_numbers: Vec<u8>,
        sold_tickets: u32,
        pot: Credits,
    },
    Started,
    NumberDrawn {
        number: u8,
        drawn_count: u32,
    },
    Winner {
        card_id: CardId,
        claimant_id: PlayerId,
        category: WinCategory,
        amount: Credits,
    },
    Finished,
    Cancelled {
        refunded_count: u32,
    },
    PlayerJoined {
        player_id: PlayerId,
        sold_tickets: u32,
    },
}

/// A [`RoomEvent`] addressed from one game, with its position in that
/// game's event stream.
///
/// `seq` starts at 1 for the first broadcast event and grows by one for
/// every event after it. A snapshot carries the `seq` of the last event
/// it already reflects (0 if none), so a viewer can tell a gap
/// (`seq > last + 1`) from a duplicate (`seq <= last`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMessage {
    pub game_id: GameId,
    pub seq: u64,
    pub event: RoomEvent,
}

// ---------------------------------------------------------------------------
// Actions (client → room)
// ---------------------------------------------------------------------------

/// An action a connected client can submit.
///
/// The client's identity is never part of the action: it comes from the
/// authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RoomAction {
    /// Start watching a game. Replaces nothing: leave first to switch.
    Join { game_id: GameId },
    /// Stop watching the current game.
    Leave,
    /// Buy a card. `numbers` picks the grid; omitted means generated.
    PurchaseCard {
        game_id: GameId,
        #[serde(default)]
        numbers: Option<Grid>,
    },
    Start { game_id: GameId },
    DrawNext { game_id: GameId },
    ClaimWin { game_id: GameId, card_id: CardId },
    Cancel { game_id: GameId },
}

/// The direct answer to a [`RoomAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ActionReply {
    Joined { game_id: GameId },
    Left { game_id: GameId },
    CardPurchased { card: Card },
    Started { game: Game },
    Cancelled { game: Game },
    NumberDrawn { number: u8 },
    Payout { payout: PayoutResult },
    /// The action failed. `code` is stable; `message` is for humans.
    Rejected { code: ErrorCode, message: String },
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Stable machine-readable reason for a rejected action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidTransition,
    GameClosed,
    PoolExhausted,
    InsufficientFunds,
    AlreadyDecided,
    Unavailable,
    NotFound,
    NotCreator,
    GameFull,
    CardLimit,
    CreatorCannotPlay,
    MinimumNotMet,
    UnknownCard,
    NotCardOwner,
    NoWinningPattern,
    InvalidCard,
    InvalidSettings,
    AlreadyViewing,
    NotViewing,
    BadRequest,
    Unauthorized,
}

impl ErrorCode {
    /// The wire spelling of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidTransition => "invalid_transition",
            Self::GameClosed => "game_closed",
            Self::PoolExhausted => "pool_exhausted",
            Self::InsufficientFunds => "insufficient_funds",
            Self::AlreadyDecided => "already_decided",
            Self::Unavailable => "unavailable",
            Self::NotFound => "not_found",
            Self::NotCreator => "not_creator",
            Self::GameFull => "game_full",
            Self::CardLimit => "card_limit",
            Self::CreatorCannotPlay => "creator_cannot_play",
            Self::MinimumNotMet => "minimum_not_met",
            Self::UnknownCard => "unknown_card",
            Self::NotCardOwner => "not_card_owner",
            Self::NoWinningPattern => "no_winning_pattern",
            Self::InvalidCard => "invalid_card",
            Self::InvalidSettings => "invalid_settings",
            Self::AlreadyViewing => "already_viewing",
            Self::NotViewing => "not_viewing",
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
        }
    }

    /// Whether resubmitting the same action later may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// What an [`Envelope`] carries.
///
/// Adjacently tagged: `{ "kind": "event", "body": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    Action(RoomAction),
    Reply(ActionReply),
    Event(RoomMessage),
}

/// The outer frame of every message on a connection.
///
/// `seq` is the sender's own per-connection counter; replies echo the
/// `seq` of the action they answer so clients can match them up.
/// `timestamp` is unix milliseconds at the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub timestamp: u64,
    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================
