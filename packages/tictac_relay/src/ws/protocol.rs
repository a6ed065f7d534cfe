//! WebSocket Protocol Types
//!
//! One JSON object per text frame, discriminated by `type`. Field names are
//! camelCase to match the browser client.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::board::{Board, Seat, winner_code};

pub const JOIN_ALLOWED_TEXT: &str = "Room is free to join.";
pub const JOIN_NOT_ALLOWED_TEXT: &str = "Room is full.";
pub const ROOM_FULL_TEXT: &str = "Room is full. You will be redirected to the homepage.";
pub const START_TEXT: &str = "Both players connected!";
pub const SEATS_SWITCHED_TEXT: &str = "Player numbers have been switched!";

/// Messages sent FROM the client TO the server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Take a seat in the room (or reclaim one after reconnecting).
    Join { room: String, player_id: String },

    /// Ask whether the room has space before joining.
    CheckJoin { room: String, player_id: String },

    /// The board after `turn_player` moved; `move_cnt` is the count before the move.
    Move {
        room: String,
        board: Board,
        turn_player: Seat,
        move_cnt: u8,
    },

    SwitchRequest { room: String, player_id: String },

    /// Chat text relayed to everyone in the room.
    Message { room: String, text: String },

    PlayAgain { room: String, player_id: String },

    /// Ask for a fresh snapshot without re-joining.
    SyncState { room: String },
}

impl ClientMessage {
    pub fn room(&self) -> &str {
        match self {
            Self::Join { room, .. }
            | Self::CheckJoin { room, .. }
            | Self::Move { room, .. }
            | Self::SwitchRequest { room, .. }
            | Self::Message { room, .. }
            | Self::PlayAgain { room, .. }
            | Self::SyncState { room } => room,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::CheckJoin { .. } => "checkJoin",
            Self::Move { .. } => "move",
            Self::SwitchRequest { .. } => "switchRequest",
            Self::Message { .. } => "message",
            Self::PlayAgain { .. } => "playAgain",
            Self::SyncState { .. } => "syncState",
        }
    }
}

/// Messages sent FROM the server TO the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    JoinAllowed {
        message: String,
    },
    JoinNotAllowed {
        message: String,
    },
    Error {
        message: String,
    },
    /// The seat this connection now occupies.
    PlayerNumber {
        player_number: Seat,
        player_id: String,
    },
    /// Full room snapshot for a (re)joining or resyncing client.
    SyncState {
        board: Board,
        turn_player: Seat,
        moves: u8,
        player1: Option<String>,
        player2: Option<String>,
        #[serde(with = "winner_code")]
        winner_player: Option<Seat>,
        game_over: bool,
        ready_to_play_again: BTreeMap<String, bool>,
        connections: usize,
    },
    Start {
        message: String,
    },
    Update {
        board: Board,
        turn_player: Seat,
        new_move_cnt: u8,
    },
    GameOver {
        #[serde(with = "winner_code")]
        winner: Option<Seat>,
        board: Board,
        new_move_cnt: u8,
    },
    Reset,
    Message {
        text: String,
    },
}

impl ServerMessage {
    pub fn join_allowed() -> Self {
        Self::JoinAllowed {
            message: JOIN_ALLOWED_TEXT.to_string(),
        }
    }

    pub fn join_not_allowed() -> Self {
        Self::JoinNotAllowed {
            message: JOIN_NOT_ALLOWED_TEXT.to_string(),
        }
    }

    pub fn room_full() -> Self {
        Self::Error {
            message: ROOM_FULL_TEXT.to_string(),
        }
    }

    pub fn start() -> Self {
        Self::Start {
            message: START_TEXT.to_string(),
        }
    }
}

/// Decode one inbound text frame. Unknown kinds and malformed payloads yield `None`.
pub fn parse_client_message(text: &str) -> Option<ClientMessage> {
    serde_json::from_str(text).ok()
}
