//! WebSocket Handler
//!
//! Per-connection socket loop: a writer draining the outbound queue and a reader
//! decoding frames and dispatching them in arrival order.

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::WebSocketConfig;
use crate::metrics::ServerMetrics;
use crate::room::{ConnectionHandle, ConnectionId, RoomRegistry};

use super::dispatch::{ConnectionContext, dispatch_client_message};
use super::protocol::{ServerMessage, parse_client_message};

/// Write one message as a text frame. Returns false once the socket is gone.
async fn write_message(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
    metrics: &ServerMetrics,
) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize message: {}", e);
            return true;
        }
    };
    if ws_sender.send(Message::Text(json.into())).await.is_err() {
        return false;
    }
    metrics.message_sent();
    true
}

/// Handle one client WebSocket until either side closes it.
pub async fn handle_room_ws(
    socket: WebSocket,
    registry: Arc<RoomRegistry>,
    ws_config: WebSocketConfig,
    server_metrics: Arc<ServerMetrics>,
) {
    let conn_id = ConnectionId::new();
    info!(conn_id = %conn_id, "New WebSocket connection");
    server_metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages to the WebSocket
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(ws_config.send_channel_capacity);
    let connection = ConnectionHandle::new(conn_id, tx, server_metrics.clone());
    let close_token = connection.close_token();

    // Task to send messages to WebSocket
    let sender_metrics = server_metrics.clone();
    let sender_task = async move {
        loop {
            tokio::select! {
                biased;
                maybe_msg = rx.recv() => {
                    let Some(msg) = maybe_msg else { break };
                    if !write_message(&mut ws_sender, &msg, &sender_metrics).await {
                        break;
                    }
                }
                _ = close_token.cancelled() => {
                    // Flush whatever was queued before the close request.
                    while let Ok(msg) = rx.try_recv() {
                        if !write_message(&mut ws_sender, &msg, &sender_metrics).await {
                            break;
                        }
                    }
                    debug!(conn_id = %conn_id, "Closing connection after final message");
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    };

    // Task to handle incoming messages
    let ctx = ConnectionContext::new(connection, registry.clone(), server_metrics.clone());
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    ctx.metrics.message_received();
                    match parse_client_message(&text) {
                        Some(client_msg) => dispatch_client_message(&ctx, client_msg).await,
                        None => {
                            ctx.metrics.message_malformed();
                            debug!(conn_id = %conn_id, "Ignoring unrecognized frame");
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!(conn_id = %conn_id, "Client closed connection");
                    break;
                }
                Err(e) => {
                    error!(conn_id = %conn_id, "WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = sender_task => debug!(conn_id = %conn_id, "Sender task ended"),
        _ = input_task => debug!(conn_id = %conn_id, "Input task ended"),
    }

    let departures = registry.disconnect(conn_id).await;
    for departure in &departures {
        debug!(
            conn_id = %conn_id,
            room = %departure.room,
            player = %departure.player_id,
            room_deleted = departure.room_deleted,
            "Released on disconnect"
        );
    }

    server_metrics.connection_closed();
    info!(conn_id = %conn_id, rooms = departures.len(), "WebSocket connection closed");
}
