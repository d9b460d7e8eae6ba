//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ArenaCommand, Broadcast};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Direct messages buffered per connection before new ones are dropped
const OUTBOX_CAPACITY: usize = 32;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Subscribe before joining so no broadcast after the join is missed
    let broadcast_rx = state.arena.subscribe();
    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);

    if state
        .arena
        .command_tx
        .send(ArenaCommand::Join {
            player_id,
            outbox: outbox_tx,
        })
        .await
        .is_err()
    {
        error!(player_id = %player_id, "Arena is not running");
        return;
    }

    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);
    run_session(
        player_id,
        ws_sink,
        ws_stream,
        &state.arena.command_tx,
        outbox_rx,
        broadcast_rx,
        rate_limiter,
    )
    .await;

    // Signal disconnect to the arena
    let _ = state
        .arena
        .command_tx
        .send(ArenaCommand::Leave { player_id })
        .await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    command_tx: &mpsc::Sender<ArenaCommand>,
    mut outbox_rx: mpsc::Receiver<ServerMsg>,
    mut broadcast_rx: broadcast::Receiver<Broadcast>,
    rate_limiter: ConnectionRateLimiter,
) {
    // Spawn writer task: direct messages and broadcasts -> WebSocket
    let mut writer_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                direct = outbox_rx.recv() => match direct {
                    Some(msg) => {
                        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                            debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                            break;
                        }
                    }
                    None => {
                        // Arena dropped this connection (rejected or removed)
                        debug!(player_id = %player_id, "Outbox closed");
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                },

                fanout = broadcast_rx.recv() => match fanout {
                    Ok(envelope) => {
                        if !envelope.is_for(&player_id) {
                            continue;
                        }
                        if let Err(e) = send_msg(&mut ws_sink, &envelope.msg).await {
                            debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            player_id = %player_id,
                            lagged_count = n,
                            "Client lagged, skipping {} messages", n
                        );
                        // Continue - don't disconnect for lag
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(player_id = %player_id, "Broadcast channel closed");
                        break;
                    }
                },
            }
        }
    });

    // Reader loop: WebSocket -> arena
    loop {
        let result = tokio::select! {
            next = ws_stream.next() => match next {
                Some(result) => result,
                None => break,
            },
            _ = &mut writer_handle => break,
        };

        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                let Some(command) = to_command(player_id, &text) else {
                    continue;
                };
                if command_tx.send(command).await.is_err() {
                    debug!(player_id = %player_id, "Command channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(player_id = %player_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(player_id = %player_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Parse a text frame into an arena command. Malformed frames are logged and
/// dropped.
fn to_command(player_id: Uuid, text: &str) -> Option<ArenaCommand> {
    let parsed = ClientMsg::parse(text).and_then(|msg| match msg {
        ClientMsg::PlayerInputBatch(batch) => batch
            .into_samples()
            .map(|samples| ArenaCommand::Input { player_id, samples }),
        ClientMsg::Ping { client_timestamp } => Ok(ArenaCommand::Ping {
            player_id,
            client_timestamp,
        }),
    });

    match parsed {
        Ok(command) => Some(command),
        Err(e) => {
            warn!(player_id = %player_id, error = %e, "Rejected client message");
            None
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
