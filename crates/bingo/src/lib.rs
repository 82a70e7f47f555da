//! # Bingo hall
//!
//! A real-time bingo hall on top of [`bingo_engine`]. Clients connect
//! with a token, the [`Authenticator`] turns it into a player id, and a
//! [`ClientConnection`] routes the player's JSON actions to the game
//! actors and streams room events back.
//!
//! Transport is left to the embedding: feed inbound frames to
//! [`ClientConnection::handle_frame`] and write out whatever
//! [`ClientConnection::next_event_frame`] yields.
//!
//! ```rust,ignore
//! use bingo::prelude::*;
//!
//! let server = BingoServerBuilder::new().build(wallet, store, MyAuth)?;
//! let game = server.create_game(PlayerId(1), GameSettings::default()).await?;
//! let mut conn = server.connect("token-of-player-2").await?;
//! let reply = conn.handle_frame(br#"{"seq":1,"timestamp":0,"payload":{"kind":"action","body":{"action":"join","game_id":1}}}"#).await?;
//! ```

mod auth;
mod error;
mod handler;
mod server;
pub mod telemetry;

pub use auth::Authenticator;
pub use error::BingoError;
pub use handler::ClientConnection;
pub use server::{BingoServer, BingoServerBuilder};

pub mod prelude {
    pub use crate::{Authenticator, BingoError, BingoServer, BingoServerBuilder, ClientConnection};
    pub use bingo_engine::{
        AutostartPolicy, CardChoice, CategoryPolicy, DrawnNumbers, EngineConfig, EngineError,
        GameRegistry, GameSettings, GameStore, InMemoryGameStore, InMemoryWallet,
        PatternValidator, PrizeTable, Wallet,
    };
    pub use bingo_protocol::{
        ActionReply, Card, CardId, Codec, Credits, Envelope, ErrorCode, Game, GameId, GameStatus,
        Grid, JsonCodec, Payload, PayoutResult, PlayerId, RoomAction, RoomEvent, RoomMessage,
        ViewerId, WinCategory,
    };
}
