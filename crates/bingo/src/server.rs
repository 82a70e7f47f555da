//! `BingoServer` builder and connection entry point.
//!
//! The server owns the [`GameRegistry`], the authenticator and the
//! codec. It does not own a listener: an embedding accepts connections
//! on whatever transport it likes and hands each one's frames to a
//! [`ClientConnection`].

use std::sync::Arc;

use bingo_engine::{EngineConfig, GameRegistry, GameSettings, GameStore, Wallet};
use bingo_protocol::{Codec, Game, JsonCodec, PlayerId};

use crate::handler::ClientConnection;
use crate::{Authenticator, BingoError};

/// Shared state every connection handler holds.
pub(crate) struct ServerState<W, S, A, C> {
    pub(crate) registry: GameRegistry<W, S>,
    pub(crate) auth: A,
    pub(crate) codec: C,
}

/// Builder for a [`BingoServer`].
///
/// ```rust,ignore
/// let server = BingoServerBuilder::new()
///     .config(EngineConfig::default())
///     .build(wallet, store, MyAuth)?;
/// let mut conn = server.connect("player-token").await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct BingoServerBuilder {
    config: EngineConfig,
}

impl BingoServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine configuration shared by every game.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the server with the JSON codec. Must be called inside a
    /// Tokio runtime.
    ///
    /// # Errors
    /// [`BingoError::Engine`] if the configuration does not validate.
    pub fn build<W, S, A>(
        self,
        wallet: Arc<W>,
        store: Arc<S>,
        auth: A,
    ) -> Result<BingoServer<W, S, A, JsonCodec>, BingoError>
    where
        W: Wallet,
        S: GameStore,
        A: Authenticator,
    {
        let registry = GameRegistry::new(wallet, store, self.config)?;
        tracing::info!(
            policy = ?registry.config().category_policy,
            prize_bp = registry.config().prize_table.total(),
            "bingo server ready"
        );
        Ok(BingoServer {
            state: Arc::new(ServerState {
                registry,
                auth,
                codec: JsonCodec,
            }),
        })
    }
}

/// A bingo hall: authenticates clients and routes their actions.
pub struct BingoServer<W, S, A, C> {
    state: Arc<ServerState<W, S, A, C>>,
}

impl<W, S, A, C> Clone for BingoServer<W, S, A, C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<W, S, A, C> BingoServer<W, S, A, C>
where
    W: Wallet,
    S: GameStore,
    A: Authenticator,
    C: Codec,
{
    pub fn registry(&self) -> &GameRegistry<W, S> {
        &self.state.registry
    }

    /// Authenticates `token` and opens a connection for that player.
    ///
    /// # Errors
    /// [`BingoError::Unauthorized`] if the authenticator rejects the token.
    pub async fn connect(&self, token: &str) -> Result<ClientConnection<W, S, A, C>, BingoError> {
        let player_id = match self.state.auth.authenticate(token).await {
            Ok(id) => id,
            Err(err) => {
                tracing::debug!(error = %err, "connection rejected");
                return Err(err);
            }
        };
        let conn = ClientConnection::new(player_id, Arc::clone(&self.state));
        tracing::info!(%player_id, viewer = %conn.viewer(), "player connected");
        Ok(conn)
    }

    /// Creates a game owned by `creator`.
    pub async fn create_game(
        &self,
        creator: PlayerId,
        settings: GameSettings,
    ) -> Result<Game, BingoError> {
        Ok(self.state.registry.create_game(creator, settings).await?)
    }

    /// Stops every live game actor.
    pub async fn shutdown(&self) {
        self.state.registry.shutdown().await;
    }
}
