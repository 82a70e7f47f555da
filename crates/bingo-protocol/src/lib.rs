//! Wire protocol for the bingo hall.
//!
//! This crate defines what clients and the engine say to each other:
//!
//! - **Types** ([`Game`], [`Card`], [`GameStatus`], [`WinCategory`], ids)
//!   shared by the engine and the wire.
//! - **Messages** ([`RoomAction`], [`ActionReply`], [`RoomMessage`],
//!   wrapped in an [`Envelope`]).
//! - **Codec** ([`Codec`], [`JsonCodec`]) for the byte form.
//!
//! It knows nothing about rooms, wallets or connections.

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{
    ActionReply, Envelope, ErrorCode, Payload, RoomAction, RoomEvent,
    RoomMessage,
};
pub use types::{
    CELL_COUNT, Card, CardId, Credits, FREE_CELL, FREE_CELL_INDEX, GRID_SIZE,
    Game, GameId, GameStatus, Grid, MAX_NUMBER, PayoutResult, PlayerId,
    ViewerId, WinCategory, flatten,
};
