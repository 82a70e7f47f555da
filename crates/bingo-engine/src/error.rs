//! Error types for the engine and its collaborators.

use std::fmt;

use bingo_protocol::{CardId, Credits, ErrorCode, GameId, GameStatus, PlayerId, ViewerId};

/// The mutating operations a game accepts. Used to describe a rejected
/// state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAction {
    Purchase,
    Start,
    Cancel,
    Draw,
    Claim,
}

impl fmt::Display for GameAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Purchase => write!(f, "purchase"),
            Self::Start => write!(f, "start"),
            Self::Cancel => write!(f, "cancel"),
            Self::Draw => write!(f, "draw"),
            Self::Claim => write!(f, "claim"),
        }
    }
}

/// Errors returned by game operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("game {0} not found")]
    NotFound(GameId),

    /// The game's status does not allow the action. A terminal status
    /// is reported to clients as `game_closed`.
    #[error("cannot {action} while game is {status}")]
    InvalidTransition {
        action: GameAction,
        status: GameStatus,
    },

    #[error("all 75 numbers have been drawn")]
    PoolExhausted,

    #[error("insufficient funds: {required} required")]
    InsufficientFunds { required: Credits },

    #[error("game {0} already has a winner")]
    AlreadyDecided(GameId),

    /// The wallet or the store failed. Nothing changed; retry is safe.
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// The game's actor stopped before answering.
    #[error("game {0} is unavailable")]
    RoomUnavailable(GameId),

    #[error("player {0} is not the creator of this game")]
    NotCreator(PlayerId),

    #[error("game {0} is sold out")]
    GameFull(GameId),

    #[error("player {player} already holds {limit} cards")]
    CardLimit { player: PlayerId, limit: u32 },

    #[error("the creator cannot buy cards in their own game")]
    CreatorCannotPlay,

    #[error("{sold} of {required} required cards sold")]
    MinimumNotMet { required: u32, sold: u32 },

    #[error("card {0} does not belong to this game")]
    UnknownCard(CardId),

    #[error("card {card} is not owned by {player}")]
    NotCardOwner { card: CardId, player: PlayerId },

    #[error("card {0} does not complete any pattern")]
    NoWinningPattern(CardId),

    #[error("invalid card: {0}")]
    InvalidCard(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("viewer {0} is already watching a game")]
    AlreadyViewing(ViewerId),

    #[error("viewer {0} is not watching a game")]
    NotViewing(ViewerId),
}

impl EngineError {
    /// The stable code reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidTransition { status, .. } if status.is_terminal() => {
                ErrorCode::GameClosed
            }
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::PoolExhausted => ErrorCode::PoolExhausted,
            Self::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            Self::AlreadyDecided(_) => ErrorCode::AlreadyDecided,
            Self::CollaboratorUnavailable(_) | Self::RoomUnavailable(_) => {
                ErrorCode::Unavailable
            }
            Self::NotCreator(_) => ErrorCode::NotCreator,
            Self::GameFull(_) => ErrorCode::GameFull,
            Self::CardLimit { .. } => ErrorCode::CardLimit,
            Self::CreatorCannotPlay => ErrorCode::CreatorCannotPlay,
            Self::MinimumNotMet { .. } => ErrorCode::MinimumNotMet,
            Self::UnknownCard(_) => ErrorCode::UnknownCard,
            Self::NotCardOwner { .. } => ErrorCode::NotCardOwner,
            Self::NoWinningPattern(_) => ErrorCode::NoWinningPattern,
            Self::InvalidCard(_) => ErrorCode::InvalidCard,
            Self::InvalidSettings(_) => ErrorCode::InvalidSettings,
            Self::AlreadyViewing(_) => ErrorCode::AlreadyViewing,
            Self::NotViewing(_) => ErrorCode::NotViewing,
        }
    }
}

impl From<WalletError> for EngineError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InsufficientFunds { required, .. } => {
                Self::InsufficientFunds { required }
            }
            other => Self::CollaboratorUnavailable(other.to_string()),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(game_id) => Self::NotFound(game_id),
            other => Self::CollaboratorUnavailable(other.to_string()),
        }
    }
}

/// Errors returned by a [`Wallet`](crate::Wallet).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("balance {available} is below {required}")]
    InsufficientFunds {
        available: Credits,
        required: Credits,
    },

    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    /// `reverse` was called with a key that was never applied.
    #[error("no transfer recorded under key {0}")]
    UnknownTransfer(String),
}

/// Errors returned by a [`GameStore`](crate::GameStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("game {0} is not stored")]
    NotFound(GameId),

    #[error("game {0} is already stored")]
    AlreadyExists(GameId),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_on_terminal_game_is_game_closed() {
        let closed = EngineError::InvalidTransition {
            action: GameAction::Draw,
            status: GameStatus::Finished,
        };
        assert_eq!(closed.code(), ErrorCode::GameClosed);

        let early = EngineError::InvalidTransition {
            action: GameAction::Draw,
            status: GameStatus::Open,
        };
        assert_eq!(early.code(), ErrorCode::InvalidTransition);
        assert_eq!(early.to_string(), "cannot draw while game is OPEN");
    }

    #[test]
    fn test_wallet_shortfall_maps_to_insufficient_funds() {
        let err: EngineError = WalletError::InsufficientFunds {
            available: 10,
            required: 100,
        }
        .into();
        assert!(matches!(
            err,
            EngineError::InsufficientFunds { required: 100 }
        ));
    }

    #[test]
    fn test_collaborator_outage_maps_to_unavailable() {
        let err: EngineError = WalletError::Unavailable("timeout".into()).into();
        assert_eq!(err.code(), ErrorCode::Unavailable);

        let err: EngineError = StoreError::Unavailable("disk".into()).into();
        assert_eq!(err.code(), ErrorCode::Unavailable);

        let err: EngineError = StoreError::NotFound(GameId(9)).into();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
