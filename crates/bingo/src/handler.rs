//! Per-connection handler: decode actions, route them, encode replies.
//!
//! A [`ClientConnection`] belongs to one authenticated player. Every
//! action runs as that player; the client never names itself. The
//! connection is also a viewer: after `join`, room events for the
//! watched game queue up and are read with [`ClientConnection::next_event`].
//!
//! Dropping the connection leaves the watched game.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bingo_engine::{EngineError, GameRegistry, GameStore, ViewerSender, Wallet};
use bingo_protocol::{
    ActionReply, Codec, Envelope, ErrorCode, Payload, PlayerId, RoomAction, RoomMessage, ViewerId,
};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::{Authenticator, BingoError};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Leaves the watched game when the connection goes away.
///
/// `Drop` is synchronous, so the leave runs on a spawned task.
struct ViewerGuard<W: Wallet, S: GameStore> {
    viewer: ViewerId,
    registry: GameRegistry<W, S>,
}

impl<W: Wallet, S: GameStore> Drop for ViewerGuard<W, S> {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let viewer = self.viewer;
        let registry = self.registry.clone();
        runtime.spawn(async move {
            if let Ok(game_id) = registry.leave(viewer).await {
                tracing::debug!(%viewer, %game_id, "viewer left on disconnect");
            }
        });
    }
}

/// One authenticated client.
pub struct ClientConnection<W: Wallet, S: GameStore, A, C> {
    player_id: PlayerId,
    viewer: ViewerId,
    state: Arc<ServerState<W, S, A, C>>,
    events_tx: ViewerSender,
    events_rx: mpsc::UnboundedReceiver<RoomMessage>,
    /// Sequence number for frames this side originates (events).
    sent: u64,
    _guard: ViewerGuard<W, S>,
}

impl<W, S, A, C> ClientConnection<W, S, A, C>
where
    W: Wallet,
    S: GameStore,
    A: Authenticator,
    C: Codec,
{
    pub(crate) fn new(player_id: PlayerId, state: Arc<ServerState<W, S, A, C>>) -> Self {
        let viewer = state.registry.allocate_viewer();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let _guard = ViewerGuard {
            viewer,
            registry: state.registry.clone(),
        };
        Self {
            player_id,
            viewer,
            state,
            events_tx,
            events_rx,
            sent: 0,
            _guard,
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn viewer(&self) -> ViewerId {
        self.viewer
    }

    /// Runs one action as this connection's player.
    ///
    /// Failures come back as [`ActionReply::Rejected`], never as `Err`.
    pub async fn handle_action(&self, action: RoomAction) -> ActionReply {
        match self.dispatch(action).await {
            Ok(reply) => reply,
            Err(err) => {
                let code = err.code();
                tracing::debug!(player_id = %self.player_id, %code, error = %err, "action rejected");
                ActionReply::Rejected {
                    code,
                    message: err.to_string(),
                }
            }
        }
    }

    async fn dispatch(&self, action: RoomAction) -> Result<ActionReply, EngineError> {
        let registry = &self.state.registry;
        let player = self.player_id;

        let reply = match action {
            RoomAction::Join { game_id } => {
                registry
                    .join(self.viewer, game_id, self.events_tx.clone())
                    .await?;
                ActionReply::Joined { game_id }
            }
            RoomAction::Leave => {
                let game_id = registry.leave(self.viewer).await?;
                ActionReply::Left { game_id }
            }
            RoomAction::PurchaseCard { game_id, numbers } => {
                let card = registry
                    .purchase_card(game_id, player, numbers.into())
                    .await?;
                ActionReply::CardPurchased { card }
            }
            RoomAction::Start { game_id } => ActionReply::Started {
                game: registry.start(game_id, player).await?,
            },
            RoomAction::DrawNext { game_id } => ActionReply::NumberDrawn {
                number: registry.draw_next(game_id, player).await?,
            },
            RoomAction::ClaimWin { game_id, card_id } => ActionReply::Payout {
                payout: registry.claim_win(game_id, card_id, player).await?,
            },
            RoomAction::Cancel { game_id } => ActionReply::Cancelled {
                game: registry.cancel(game_id, player).await?,
            },
        };
        Ok(reply)
    }

    /// Decodes one inbound frame, runs its action and returns the encoded
    /// reply. The reply echoes the action's `seq`.
    ///
    /// A frame that does not decode to an action is answered with a
    /// `bad_request` rejection carrying `seq` 0.
    ///
    /// # Errors
    /// [`BingoError::Protocol`] only if the reply itself cannot be encoded.
    pub async fn handle_frame(&mut self, frame: &[u8]) -> Result<Vec<u8>, BingoError> {
        let (seq, reply) = match self.state.codec.decode::<Envelope>(frame) {
            Ok(Envelope {
                seq,
                payload: Payload::Action(action),
                ..
            }) => (seq, self.handle_action(action).await),
            Ok(envelope) => (
                envelope.seq,
                ActionReply::Rejected {
                    code: ErrorCode::BadRequest,
                    message: "expected an action".into(),
                },
            ),
            Err(err) => {
                tracing::debug!(player_id = %self.player_id, error = %err, "undecodable frame");
                (
                    0,
                    ActionReply::Rejected {
                        code: ErrorCode::BadRequest,
                        message: err.to_string(),
                    },
                )
            }
        };

        let envelope = Envelope {
            seq,
            timestamp: now_ms(),
            payload: Payload::Reply(reply),
        };
        Ok(self.state.codec.encode(&envelope)?)
    }

    /// Waits for the next event of the watched game.
    pub async fn next_event(&mut self) -> Option<RoomMessage> {
        self.events_rx.recv().await
    }

    /// The next queued event, without waiting.
    pub fn try_next_event(&mut self) -> Option<RoomMessage> {
        self.events_rx.try_recv().ok()
    }

    /// Waits for the next event and encodes it as an outbound frame.
    ///
    /// Returns `Ok(None)` if the event channel closed.
    pub async fn next_event_frame(&mut self) -> Result<Option<Vec<u8>>, BingoError> {
        let Some(message) = self.events_rx.recv().await else {
            return Ok(None);
        };
        self.sent += 1;
        let envelope = Envelope {
            seq: self.sent,
            timestamp: now_ms(),
            payload: Payload::Event(message),
        };
        Ok(Some(self.state.codec.encode(&envelope)?))
    }
}
