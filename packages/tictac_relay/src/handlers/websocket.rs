use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Upgrade to the room socket. Oversized frames are refused by the codec.
pub async fn room_websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let registry = state.registry.clone();
    let ws_config = state.config.websocket.clone();
    let metrics = state.metrics.clone();

    ws.max_message_size(ws_config.max_message_bytes)
        .on_upgrade(move |socket| ws::handle_room_ws(socket, registry, ws_config, metrics))
}
