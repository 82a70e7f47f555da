//! Unified error type for the bingo hall.

use bingo_engine::EngineError;
use bingo_protocol::{ErrorCode, ProtocolError};

/// Top-level error wrapping the protocol and engine errors.
///
/// `?` converts either automatically through the `#[from]` impls.
#[derive(Debug, thiserror::Error)]
pub enum BingoError {
    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The engine rejected an action.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The authenticator turned the client away.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl BingoError {
    /// The stable code reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol(_) => ErrorCode::BadRequest,
            Self::Engine(err) => err.code(),
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
        }
    }
}
