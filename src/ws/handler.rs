//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{PlayerInput, RoomHandle};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.room))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, room: RoomHandle) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (direct_rx, broadcast_rx) = match room.connect(connection_id).await {
        Ok(channels) => channels,
        Err(e) => {
            error!(connection_id = %connection_id, error = %e, "Failed to register connection");
            return;
        }
    };

    let (ws_sink, ws_stream) = socket.split();

    run_session(connection_id, &room, ws_sink, ws_stream, direct_rx, broadcast_rx).await;

    // Cleanup on disconnect
    if let Err(e) = room.disconnect(connection_id).await {
        debug!(connection_id = %connection_id, error = %e, "Room gone before disconnect");
    }

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    connection_id: Uuid,
    room: &RoomHandle,
    ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    direct_rx: mpsc::Receiver<ServerMsg>,
    broadcast_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Spawn writer task: room messages -> WebSocket
    let writer_handle = tokio::spawn(write_loop(connection_id, ws_sink, direct_rx, broadcast_rx));

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(connection_id = %connection_id, "Rate limited message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        let input = PlayerInput {
                            connection_id,
                            msg,
                            received_at: unix_millis(),
                        };

                        if room.send_input(input).await.is_err() {
                            debug!(connection_id = %connection_id, "Room closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Forward direct and broadcast messages to the socket until either side closes
async fn write_loop(
    connection_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut direct_rx: mpsc::Receiver<ServerMsg>,
    mut broadcast_rx: broadcast::Receiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            direct = direct_rx.recv() => match direct {
                Some(msg) => msg,
                None => break,
            },
            broadcast = broadcast_rx.recv() => match broadcast {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        connection_id = %connection_id,
                        lagged_count = n,
                        "Client lagged, skipping {} messages", n
                    );
                    // Continue - the next full state resyncs the client
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(connection_id = %connection_id, "Broadcast channel closed");
                    break;
                }
            },
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
