//! Room WebSocket Handler
//!
//! One WebSocket connection per browser tab that:
//! - Carries JSON game events for any number of rooms
//! - Receives room broadcasts through a bounded per-connection queue
//! - Releases its seats when the socket closes

pub(crate) mod dispatch;
mod handler;
mod protocol;

pub use handler::handle_room_ws;
pub use protocol::{
    ClientMessage, JOIN_ALLOWED_TEXT, JOIN_NOT_ALLOWED_TEXT, ROOM_FULL_TEXT, SEATS_SWITCHED_TEXT,
    START_TEXT, ServerMessage, parse_client_message,
};
