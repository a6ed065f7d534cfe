//! Message dispatcher.
//!
//! Routes each decoded `ClientMessage` to its room handler. `join` and
//! `checkJoin` create rooms on first reference; every other event only acts on
//! a room that already exists and is dropped otherwise.

use std::sync::Arc;
use tracing::{debug, info};

use crate::metrics::ServerMetrics;
use crate::room::{ConnectionHandle, RoomRegistry};

use super::protocol::ClientMessage;

/// Per-connection context shared between the socket loop and the dispatcher.
pub(crate) struct ConnectionContext {
    pub connection: ConnectionHandle,
    pub registry: Arc<RoomRegistry>,
    pub metrics: Arc<ServerMetrics>,
}

impl ConnectionContext {
    pub(crate) fn new(
        connection: ConnectionHandle,
        registry: Arc<RoomRegistry>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            connection,
            registry,
            metrics,
        }
    }
}

/// Apply one inbound event. Runs the room handler to completion, broadcast included.
pub(crate) async fn dispatch_client_message(ctx: &ConnectionContext, msg: ClientMessage) {
    let conn_id = ctx.connection.id();
    debug!(conn_id = %conn_id, kind = msg.kind(), room = %msg.room(), "Dispatching client message");

    match msg {
        ClientMessage::CheckJoin { room, player_id } => {
            let mut guard = ctx.registry.get_or_create(&room).await;
            if let Err(e) = guard.check_join(&player_id, &ctx.connection) {
                ctx.metrics.admission_rejected();
                info!(room = %room, player = %player_id, conn_id = %conn_id, code = e.error_code(), "checkJoin rejected: {}", e);
            }
        }
        ClientMessage::Join { room, player_id } => {
            let mut guard = ctx.registry.get_or_create(&room).await;
            if let Err(e) = guard.join(&player_id, &ctx.connection) {
                ctx.metrics.admission_rejected();
                info!(room = %room, player = %player_id, conn_id = %conn_id, code = e.error_code(), "Join rejected: {}", e);
            }
        }
        ClientMessage::Move {
            room,
            board,
            turn_player,
            move_cnt,
        } => {
            let Some(mut guard) = ctx.registry.get(&room).await else {
                debug!(room = %room, "Move for unknown room ignored");
                return;
            };
            let outcome = guard.apply_move(board, turn_player, move_cnt);
            if outcome.game_over {
                ctx.metrics.game_finished(outcome.winner.is_none());
            }
        }
        ClientMessage::SwitchRequest { room, player_id } => {
            let Some(mut guard) = ctx.registry.get(&room).await else {
                debug!(room = %room, "Switch request for unknown room ignored");
                return;
            };
            if guard.request_switch(&player_id) {
                ctx.metrics.seats_swapped();
            }
        }
        ClientMessage::Message { room, text } => {
            let Some(guard) = ctx.registry.get(&room).await else {
                debug!(room = %room, "Chat for unknown room ignored");
                return;
            };
            guard.relay_chat(text);
        }
        ClientMessage::PlayAgain { room, player_id } => {
            let Some(mut guard) = ctx.registry.get(&room).await else {
                debug!(room = %room, "Play-again for unknown room ignored");
                return;
            };
            if guard.play_again(&player_id) {
                ctx.metrics.rematch_started();
            }
        }
        ClientMessage::SyncState { room } => {
            let Some(guard) = ctx.registry.get(&room).await else {
                debug!(room = %room, "Sync for unknown room ignored");
                return;
            };
            guard.sync(&ctx.connection);
        }
    }
}
