//! Delivery of room events to viewers.
//!
//! A viewer is anyone watching a game: a player, the creator, or a
//! spectator. Each one hands the room an unbounded sender when it joins
//! and gets a snapshot of the game straight away, then every event the
//! room publishes after that.
//!
//! # Sequence numbers
//!
//! Every published event gets the next number of a per-game counter that
//! starts at 1. The snapshot carries the number of the last event it
//! already reflects, so a client can stitch the snapshot and the stream
//! together without gaps or repeats.
//!
//! A viewer whose receiver is gone is dropped on the next publish, or on
//! [`RoomBroadcaster::prune`] when nothing is being published.

use std::collections::HashMap;

use bingo_protocol::{GameId, RoomEvent, RoomMessage, ViewerId};
use tokio::sync::mpsc;

/// Channel a viewer receives its room's messages on. Unbounded so a slow
/// viewer never stalls the game.
pub type ViewerSender = mpsc::UnboundedSender<RoomMessage>;

/// The viewers of one game and the game's event sequence counter.
///
/// Owned by the game's actor, so every publish happens in commit order.
#[derive(Debug)]
pub struct RoomBroadcaster {
    game_id: GameId,
    seq: u64,
    viewers: HashMap<ViewerId, ViewerSender>,
}

impl RoomBroadcaster {
    pub fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            seq: 0,
            viewers: HashMap::new(),
        }
    }

    /// Adds a viewer and sends it `snapshot`, stamped with the last
    /// sequence number it already reflects.
    ///
    /// Returns `false` if the viewer's channel was already closed; it is
    /// not added in that case.
    pub fn join(&mut self, viewer: ViewerId, sender: ViewerSender, snapshot: RoomEvent) -> bool {
        let msg = RoomMessage {
            game_id: self.game_id,
            seq: self.seq,
            event: snapshot,
        };
        if sender.send(msg).is_err() {
            return false;
        }
        self.viewers.insert(viewer, sender);
        true
    }

    /// Removes a viewer. Returns `false` if it was not present.
    pub fn leave(&mut self, viewer: ViewerId) -> bool {
        self.viewers.remove(&viewer).is_some()
    }

    pub fn contains(&self, viewer: ViewerId) -> bool {
        self.viewers.contains_key(&viewer)
    }

    /// Sends each event to every viewer, numbering them consecutively.
    /// Viewers whose channel has closed are dropped.
    pub fn publish(&mut self, events: Vec<RoomEvent>) {
        for event in events {
            self.seq += 1;
            let msg = RoomMessage {
                game_id: self.game_id,
                seq: self.seq,
                event,
            };

            let game_id = self.game_id;
            self.viewers.retain(|viewer, sender| {
                if sender.send(msg.clone()).is_ok() {
                    true
                } else {
                    tracing::warn!(%game_id, %viewer, "viewer channel closed, dropping");
                    false
                }
            });
        }
    }

    /// The sequence number of the last published event.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    /// Drops viewers whose receiving side has gone away.
    pub fn prune(&mut self) {
        self.viewers.retain(|_, sender| !sender.is_closed());
    }
}
