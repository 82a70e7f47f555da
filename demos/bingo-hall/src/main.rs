use std::sync::Arc;
use std::time::Duration;

use bingo::prelude::*;

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

const HOST: PlayerId = PlayerId(1);
const PLAYERS: [u64; 4] = [2, 3, 4, 5];
const STARTING_BALANCE: Credits = 500;

/// Uses the numeric token as the player id.
struct TokenAuth;

impl Authenticator for TokenAuth {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, BingoError> {
        token
            .parse()
            .map(PlayerId)
            .map_err(|_| BingoError::Unauthorized(format!("bad token {token:?}")))
    }
}

fn purchase_frame(game_id: GameId) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&Envelope {
        seq: 1,
        timestamp: 0,
        payload: Payload::Action(RoomAction::PurchaseCard {
            game_id,
            numbers: None,
        }),
    })
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bingo::telemetry::init_tracing("info");

    let wallet = Arc::new(InMemoryWallet::new());
    let store = Arc::new(InMemoryGameStore::new());
    for id in PLAYERS {
        wallet.deposit(PlayerId(id), STARTING_BALANCE).await;
    }

    let server = BingoServerBuilder::new()
        .config(EngineConfig::default())
        .build(Arc::clone(&wallet), store, TokenAuth)?;

    let settings = GameSettings {
        card_price: 100,
        min_cards: 3,
        max_cards: 20,
        max_cards_per_player: 2,
        autostart: Some(AutostartPolicy {
            threshold: PLAYERS.len() as u32,
            delay: Duration::from_millis(500),
        }),
        auto_draw_interval: Some(Duration::from_millis(20)),
        expire_after: Some(Duration::from_secs(60)),
    };
    let game = server.create_game(HOST, settings).await?;
    tracing::info!(game_id = %game.id, "hall open");

    let mut host = server.connect(&HOST.0.to_string()).await?;
    host.handle_action(RoomAction::Join { game_id: game.id })
        .await;

    // Every player buys one generated card over the wire.
    let mut seats = Vec::new();
    for id in PLAYERS {
        let mut conn = server.connect(&id.to_string()).await?;
        let reply: Envelope = JsonCodec.decode(&conn.handle_frame(&purchase_frame(game.id)?).await?)?;
        match reply.payload {
            Payload::Reply(ActionReply::CardPurchased { card }) => {
                tracing::info!(player_id = %conn.player_id(), card_id = %card.id, "card bought");
                seats.push((conn, card));
            }
            other => tracing::warn!(player_id = id, reply = ?other, "purchase failed"),
        }
    }

    // Watch the room; each player claims as soon as a local check says so.
    let validator = PatternValidator::standard(true);
    let mut drawn = DrawnNumbers::new();
    while let Some(message) = host.next_event().await {
        match message.event {
            RoomEvent::NumberDrawn {
                number,
                drawn_count,
            } => {
                drawn.insert(number);
                tracing::info!(seq = message.seq, number, drawn_count, "ball");
                let winner = seats
                    .iter()
                    .find(|(_, card)| validator.is_winner(&card.grid, &drawn));
                if let Some((conn, card)) = winner {
                    let reply = conn
                        .handle_action(RoomAction::ClaimWin {
                            game_id: game.id,
                            card_id: card.id,
                        })
                        .await;
                    tracing::info!(player_id = %conn.player_id(), reply = ?reply, "bingo!");
                }
            }
            RoomEvent::Winner {
                card_id,
                claimant_id,
                category,
                amount,
            } => {
                tracing::info!(%card_id, %claimant_id, %category, amount, "winner announced");
            }
            RoomEvent::Finished | RoomEvent::Cancelled { .. } => {
                tracing::info!(seq = message.seq, event = ?message.event, "game over");
                break;
            }
            event => tracing::info!(seq = message.seq, ?event, "room event"),
        }
    }

    for id in PLAYERS {
        let balance = wallet.balance(PlayerId(id)).await;
        tracing::info!(player_id = id, balance, "final balance");
    }

    server.shutdown().await;
    Ok(())
}
