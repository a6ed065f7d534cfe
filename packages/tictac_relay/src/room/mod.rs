//! Room State
//!
//! A room is one two-seat game session. Every handler here runs with the room's
//! mutex held (see [`registry::RoomRegistry`]) and finishes its broadcast before
//! returning, so events for one room are applied strictly one at a time.

pub mod registry;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::board::{Board, Outcome, Seat};
use crate::error::RelayError;
use crate::metrics::ServerMetrics;
use crate::ws::{SEATS_SWITCHED_TEXT, ServerMessage};

pub use registry::RoomRegistry;

/// Identity of one transport connection. A reconnecting player gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Sending half of a connection's outbound queue.
///
/// Enqueueing never waits: a room lock must not be held across a slow socket.
/// The close request travels on its own token, so a full queue can drop
/// messages but never the close.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<ServerMessage>,
    close: CancellationToken,
    metrics: Arc<ServerMetrics>,
}

impl ConnectionHandle {
    pub fn new(
        id: ConnectionId,
        tx: mpsc::Sender<ServerMessage>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            id,
            tx,
            close: CancellationToken::new(),
            metrics,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Ask the writer to flush what is queued and then close the socket.
    pub fn close(&self) {
        self.close.cancel();
    }

    pub fn is_closing(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Token the writer task waits on.
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }

    pub fn send(&self, msg: ServerMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, "Outbound queue full, dropping message");
                self.metrics.message_dropped();
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(conn_id = %self.id, "Connection already closed, dropping message");
                self.metrics.message_dropped();
                false
            }
        }
    }
}

pub struct Room {
    id: String,
    player_a: Option<String>,
    player_b: Option<String>,
    board: Board,
    turn: Seat,
    moves: u8,
    /// Live connection per player id; checkJoin may add entries with no seat.
    connections: HashMap<String, ConnectionHandle>,
    rematch_ready: HashSet<String>,
    switch_pending: HashSet<String>,
    /// Set once the room has been unlinked from the registry.
    retired: bool,
}

impl Room {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            player_a: None,
            player_b: None,
            board: Board::new(),
            turn: Seat::A,
            moves: 0,
            connections: HashMap::new(),
            rematch_ready: HashSet::new(),
            switch_pending: HashSet::new(),
            retired: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Seat {
        self.turn
    }

    pub fn moves(&self) -> u8 {
        self.moves
    }

    pub fn occupant(&self, seat: Seat) -> Option<&str> {
        match seat {
            Seat::A => self.player_a.as_deref(),
            Seat::B => self.player_b.as_deref(),
        }
    }

    pub fn seat_of(&self, player_id: &str) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|&seat| self.occupant(seat) == Some(player_id))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn rematch_ready(&self) -> &HashSet<String> {
        &self.rematch_ready
    }

    pub fn switch_pending(&self) -> &HashSet<String> {
        &self.switch_pending
    }

    /// Both seats are empty; the registry deletes rooms in this state.
    pub fn is_vacant(&self) -> bool {
        self.player_a.is_none() && self.player_b.is_none()
    }

    pub fn is_full(&self) -> bool {
        self.player_a.is_some() && self.player_b.is_some()
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
        self.connections.clear();
        self.rematch_ready.clear();
        self.switch_pending.clear();
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::evaluate(&self.board, self.moves)
    }

    fn seat_mut(&mut self, seat: Seat) -> &mut Option<String> {
        match seat {
            Seat::A => &mut self.player_a,
            Seat::B => &mut self.player_b,
        }
    }

    /// Both seats are taken and both occupants are in `set`.
    fn both_seated_in(&self, set: &HashSet<String>) -> bool {
        match (&self.player_a, &self.player_b) {
            (Some(a), Some(b)) => set.contains(a) && set.contains(b),
            _ => false,
        }
    }

    fn broadcast(&self, msg: ServerMessage) {
        for conn in self.connections.values() {
            conn.send(msg.clone());
        }
    }

    /// Full state snapshot sent on join and on request.
    pub fn snapshot(&self) -> ServerMessage {
        let outcome = self.outcome();
        ServerMessage::SyncState {
            board: self.board,
            turn_player: self.turn,
            moves: self.moves,
            player1: self.player_a.clone(),
            player2: self.player_b.clone(),
            winner_player: outcome.winner,
            game_over: outcome.game_over,
            ready_to_play_again: self
                .rematch_ready
                .iter()
                .map(|id| (id.clone(), true))
                .collect::<BTreeMap<_, _>>(),
            connections: self.connections.len(),
        }
    }

    /// Pre-join check: reserve a connection entry while fewer than two are
    /// registered. Never assigns a seat.
    pub fn check_join(&mut self, player_id: &str, conn: &ConnectionHandle) -> Result<(), RelayError> {
        if self.connections.len() >= 2 {
            conn.send(ServerMessage::join_not_allowed());
            conn.close();
            return Err(RelayError::RoomFull {
                room: self.id.clone(),
            });
        }

        self.connections.insert(player_id.to_string(), conn.clone());
        conn.send(ServerMessage::join_allowed());
        Ok(())
    }

    /// Seat a player (or re-bind a seated player's new connection), send it its
    /// seat and a snapshot, and announce the start once both seats are taken.
    pub fn join(&mut self, player_id: &str, conn: &ConnectionHandle) -> Result<Seat, RelayError> {
        let previous = self.connections.insert(player_id.to_string(), conn.clone());

        let seat = match self.seat_of(player_id) {
            Some(seat) => seat,
            None if self.player_a.is_none() => Seat::A,
            None if self.player_b.is_none() => Seat::B,
            None => {
                // Put back whatever the id had before; seated players are untouched.
                match previous {
                    Some(prev) => {
                        self.connections.insert(player_id.to_string(), prev);
                    }
                    None => {
                        self.connections.remove(player_id);
                    }
                }
                conn.send(ServerMessage::room_full());
                conn.close();
                return Err(RelayError::RoomFull {
                    room: self.id.clone(),
                });
            }
        };

        *self.seat_mut(seat) = Some(player_id.to_string());
        info!(room = %self.id, player = %player_id, seat = %seat, "Player seated");

        conn.send(ServerMessage::PlayerNumber {
            player_number: seat,
            player_id: player_id.to_string(),
        });
        conn.send(self.snapshot());

        if self.is_full() {
            self.broadcast(ServerMessage::start());
        }
        Ok(seat)
    }

    /// Apply a submitted move as-is. The board and count come from the mover's
    /// client and are not re-validated here.
    pub fn apply_move(&mut self, board: Board, mover: Seat, prior_moves: u8) -> Outcome {
        if prior_moves == 0 {
            self.rematch_ready.clear();
        }

        self.board = board;
        self.moves = prior_moves.saturating_add(1);
        self.turn = mover.other();

        let outcome = Outcome::after_move(&self.board, mover, self.moves);
        let msg = if outcome.game_over {
            info!(
                room = %self.id,
                winner = outcome.winner.map(Seat::number).unwrap_or(0),
                moves = self.moves,
                "Game over"
            );
            ServerMessage::GameOver {
                winner: outcome.winner,
                board: self.board,
                new_move_cnt: self.moves,
            }
        } else {
            ServerMessage::Update {
                board: self.board,
                turn_player: self.turn,
                new_move_cnt: self.moves,
            }
        };
        self.broadcast(msg);
        outcome
    }

    /// Send a snapshot to one connection only.
    pub fn sync(&self, conn: &ConnectionHandle) {
        conn.send(self.snapshot());
    }

    /// Record a rematch vote. Returns true when this vote completed the
    /// handshake and the board was reset.
    pub fn play_again(&mut self, player_id: &str) -> bool {
        self.rematch_ready.insert(player_id.to_string());
        if !self.both_seated_in(&self.rematch_ready) {
            return false;
        }

        self.board = Board::new();
        self.turn = Seat::A;
        self.moves = 0;
        self.rematch_ready.clear();
        info!(room = %self.id, "Rematch agreed, board reset");
        self.broadcast(ServerMessage::Reset);
        true
    }

    /// Record a seat-swap vote. Returns true when both seated players agreed
    /// and the seats were exchanged. Board, turn and move count are untouched.
    pub fn request_switch(&mut self, player_id: &str) -> bool {
        self.switch_pending.insert(player_id.to_string());
        if !self.both_seated_in(&self.switch_pending) {
            return false;
        }

        std::mem::swap(&mut self.player_a, &mut self.player_b);
        self.switch_pending.clear();
        info!(room = %self.id, "Seats switched");

        for seat in Seat::ALL {
            let Some(player_id) = self.occupant(seat) else {
                continue;
            };
            match self.connections.get(player_id) {
                Some(conn) => {
                    conn.send(ServerMessage::PlayerNumber {
                        player_number: seat,
                        player_id: player_id.to_string(),
                    });
                }
                None => {
                    warn!(room = %self.id, player = %player_id, "Seated player has no connection to notify");
                }
            }
        }

        self.broadcast(ServerMessage::Message {
            text: SEATS_SWITCHED_TEXT.to_string(),
        });
        true
    }

    pub fn relay_chat(&self, text: String) {
        self.broadcast(ServerMessage::Message { text });
    }

    /// Drop the entry bound to `conn_id` and vacate that player's seat.
    /// Returns the player id that was bound to the connection, if any.
    pub fn remove_connection(&mut self, conn_id: ConnectionId) -> Option<String> {
        let player_id = self
            .connections
            .iter()
            .find(|(_, conn)| conn.id() == conn_id)
            .map(|(player_id, _)| player_id.clone())?;

        self.connections.remove(&player_id);
        if let Some(seat) = self.seat_of(&player_id) {
            *self.seat_mut(seat) = None;
            info!(room = %self.id, player = %player_id, seat = %seat, "Seat vacated");
        }
        Some(player_id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_connection() -> (ConnectionHandle, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = ConnectionHandle::new(ConnectionId::new(), tx, Arc::new(ServerMetrics::new()));
        (conn, rx)
    }

    pub(crate) fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    fn kinds(msgs: &[ServerMessage]) -> Vec<&'static str> {
        msgs.iter()
            .map(|msg| match msg {
                ServerMessage::JoinAllowed { .. } => "joinAllowed",
                ServerMessage::JoinNotAllowed { .. } => "joinNotAllowed",
                ServerMessage::Error { .. } => "error",
                ServerMessage::PlayerNumber { .. } => "playerNumber",
                ServerMessage::SyncState { .. } => "syncState",
                ServerMessage::Start { .. } => "start",
                ServerMessage::Update { .. } => "update",
                ServerMessage::GameOver { .. } => "gameOver",
                ServerMessage::Reset => "reset",
                ServerMessage::Message { .. } => "message",
            })
            .collect()
    }

    /// Room "R1" with p1 in seat A and p2 in seat B, receivers already drained.
    fn seated_room() -> (
        Room,
        (ConnectionHandle, mpsc::Receiver<ServerMessage>),
        (ConnectionHandle, mpsc::Receiver<ServerMessage>),
    ) {
        let mut room = Room::new("R1");
        let (c1, mut rx1) = test_connection();
        let (c2, mut rx2) = test_connection();
        room.join("p1", &c1).unwrap();
        room.join("p2", &c2).unwrap();
        drain(&mut rx1);
        drain(&mut rx2);
        (room, (c1, rx1), (c2, rx2))
    }

    #[test]
    fn test_two_players_are_seated_and_started() {
        let mut room = Room::new("R1");
        let (c1, mut rx1) = test_connection();
        let (c2, mut rx2) = test_connection();

        assert_eq!(room.join("p1", &c1), Ok(Seat::A));
        assert_eq!(kinds(&drain(&mut rx1)), ["playerNumber", "syncState"]);

        assert_eq!(room.join("p2", &c2), Ok(Seat::B));
        let p2_msgs = drain(&mut rx2);
        assert_eq!(kinds(&p2_msgs), ["playerNumber", "syncState", "start"]);
        assert_eq!(
            p2_msgs[0],
            ServerMessage::PlayerNumber {
                player_number: Seat::B,
                player_id: "p2".to_string()
            }
        );
        assert_eq!(kinds(&drain(&mut rx1)), ["start"]);

        assert_eq!(room.occupant(Seat::A), Some("p1"));
        assert_eq!(room.occupant(Seat::B), Some("p2"));
        assert_eq!(room.connection_count(), 2);
    }

    #[test]
    fn test_join_snapshot_contents() {
        let (mut room, _, (c2, mut rx2)) = seated_room();
        let board = Board::new().with_mark(0, 0, Seat::A);
        room.apply_move(board, Seat::A, 0);
        drain(&mut rx2);

        room.join("p2", &c2).unwrap();
        let msgs = drain(&mut rx2);
        match &msgs[1] {
            ServerMessage::SyncState {
                board: snap_board,
                turn_player,
                moves,
                player1,
                player2,
                winner_player,
                game_over,
                connections,
                ..
            } => {
                assert_eq!(*snap_board, board);
                assert_eq!(*turn_player, Seat::B);
                assert_eq!(*moves, 1);
                assert_eq!(player1.as_deref(), Some("p1"));
                assert_eq!(player2.as_deref(), Some("p2"));
                assert_eq!(*winner_player, None);
                assert!(!game_over);
                assert_eq!(*connections, 2);
            }
            other => panic!("Expected SyncState, got {:?}", other),
        }
    }

    #[test]
    fn test_third_player_is_rejected_and_closed() {
        let (mut room, _, _) = seated_room();
        let (c3, mut rx3) = test_connection();

        let result = room.join("p3", &c3);
        assert_eq!(
            result,
            Err(RelayError::RoomFull {
                room: "R1".to_string()
            })
        );
        assert_eq!(drain(&mut rx3), [ServerMessage::room_full()]);
        assert!(c3.is_closing());
        assert_eq!(room.occupant(Seat::A), Some("p1"));
        assert_eq!(room.occupant(Seat::B), Some("p2"));
        assert_eq!(room.seat_of("p3"), None);
        assert_eq!(room.connection_count(), 2);
    }

    #[test]
    fn test_seated_player_reconnects_on_new_connection() {
        let (mut room, (old_conn, _), (_, mut rx2)) = seated_room();
        let (new_conn, mut rx_new) = test_connection();

        assert_eq!(room.join("p1", &new_conn), Ok(Seat::A));
        assert_eq!(
            kinds(&drain(&mut rx_new)),
            ["playerNumber", "syncState", "start"]
        );
        assert_eq!(kinds(&drain(&mut rx2)), ["start"]);
        assert_eq!(room.connection_count(), 2);

        // The stale transport closing afterwards no longer matches any entry.
        assert_eq!(room.remove_connection(old_conn.id()), None);
        assert_eq!(room.occupant(Seat::A), Some("p1"));
    }

    #[test]
    fn test_join_fills_vacated_seat() {
        let (mut room, (c1, _), _) = seated_room();
        assert_eq!(room.remove_connection(c1.id()), Some("p1".to_string()));
        assert_eq!(room.occupant(Seat::A), None);

        let (c3, _rx3) = test_connection();
        assert_eq!(room.join("p3", &c3), Ok(Seat::A));
        assert_eq!(room.occupant(Seat::B), Some("p2"));
    }

    #[test]
    fn test_check_join_reserves_connection() {
        let mut room = Room::new("R1");
        let (c1, mut rx1) = test_connection();
        let (c2, _rx2) = test_connection();
        let (c3, mut rx3) = test_connection();

        assert!(room.check_join("p1", &c1).is_ok());
        assert_eq!(kinds(&drain(&mut rx1)), ["joinAllowed"]);
        assert!(room.check_join("p2", &c2).is_ok());
        assert!(room.is_vacant());

        assert!(room.check_join("p3", &c3).is_err());
        assert_eq!(drain(&mut rx3), [ServerMessage::join_not_allowed()]);
        assert!(c3.is_closing());
        assert_eq!(room.connection_count(), 2);
    }

    #[test]
    fn test_check_join_for_seated_id_in_full_room_is_rejected() {
        let (mut room, (c1, mut rx1), _) = seated_room();
        let (c1_again, mut rx_again) = test_connection();

        assert_eq!(
            room.check_join("p1", &c1_again),
            Err(RelayError::RoomFull {
                room: "R1".to_string()
            })
        );
        assert_eq!(drain(&mut rx_again), [ServerMessage::join_not_allowed()]);
        assert!(c1_again.is_closing());
        assert!(!c1.is_closing());

        // p1's original connection still receives broadcasts and still owns the seat.
        room.relay_chat("hi".to_string());
        assert_eq!(
            drain(&mut rx1),
            [ServerMessage::Message {
                text: "hi".to_string()
            }]
        );
        assert_eq!(room.remove_connection(c1.id()), Some("p1".to_string()));
        assert_eq!(room.occupant(Seat::A), None);
    }

    #[test]
    fn test_move_broadcasts_update() {
        let (mut room, (_, mut rx1), (_, mut rx2)) = seated_room();
        let board = Board::new().with_mark(1, 1, Seat::A);

        let outcome = room.apply_move(board, Seat::A, 0);
        assert!(!outcome.game_over);
        let expected = ServerMessage::Update {
            board,
            turn_player: Seat::B,
            new_move_cnt: 1,
        };
        assert_eq!(drain(&mut rx1), [expected.clone()]);
        assert_eq!(drain(&mut rx2), [expected]);
        assert_eq!(room.turn(), Seat::B);
        assert_eq!(room.moves(), 1);
    }

    #[test]
    fn test_winning_move_broadcasts_game_over() {
        let (mut room, (_, mut rx1), (_, mut rx2)) = seated_room();
        let board = Board::try_from([[1, 1, 1], [2, 2, 0], [0, 0, 0]]).unwrap();

        let outcome = room.apply_move(board, Seat::A, 4);
        assert_eq!(outcome.winner, Some(Seat::A));
        let expected = ServerMessage::GameOver {
            winner: Some(Seat::A),
            board,
            new_move_cnt: 5,
        };
        assert_eq!(drain(&mut rx1), [expected.clone()]);
        assert_eq!(drain(&mut rx2), [expected]);
    }

    #[test]
    fn test_ninth_move_without_line_is_a_draw() {
        let (mut room, (_, mut rx1), _) = seated_room();
        let board = Board::try_from([[1, 2, 1], [1, 2, 2], [2, 1, 1]]).unwrap();

        let outcome = room.apply_move(board, Seat::A, 8);
        assert_eq!(outcome.winner, None);
        assert!(outcome.game_over);
        assert_eq!(
            drain(&mut rx1),
            [ServerMessage::GameOver {
                winner: None,
                board,
                new_move_cnt: 9
            }]
        );
    }

    #[test]
    fn test_rematch_needs_both_players() {
        let (mut room, (_, mut rx1), (_, mut rx2)) = seated_room();
        let board = Board::try_from([[1, 1, 1], [2, 2, 0], [0, 0, 0]]).unwrap();
        room.apply_move(board, Seat::A, 4);
        drain(&mut rx1);
        drain(&mut rx2);

        assert!(!room.play_again("p1"));
        assert!(!room.play_again("p1"));
        assert_eq!(room.rematch_ready().len(), 1);
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(room.moves(), 5);

        assert!(room.play_again("p2"));
        assert_eq!(drain(&mut rx1), [ServerMessage::Reset]);
        assert_eq!(drain(&mut rx2), [ServerMessage::Reset]);
        assert_eq!(*room.board(), Board::new());
        assert_eq!(room.turn(), Seat::A);
        assert_eq!(room.moves(), 0);
        assert!(room.rematch_ready().is_empty());
    }

    #[test]
    fn test_rematch_with_empty_seat_never_resets() {
        let (mut room, _, (c2, _)) = seated_room();
        room.remove_connection(c2.id());
        assert!(!room.play_again("p1"));
        assert!(!room.play_again("p2"));
    }

    #[test]
    fn test_first_move_clears_stale_rematch_votes() {
        let (mut room, _, _) = seated_room();
        room.play_again("p1");
        room.apply_move(Board::new().with_mark(0, 0, Seat::A), Seat::A, 0);
        assert!(room.rematch_ready().is_empty());
    }

    #[test]
    fn test_switch_swaps_seats_only_after_both_agree() {
        let (mut room, (_, mut rx1), (_, mut rx2)) = seated_room();
        let board = Board::new().with_mark(0, 0, Seat::A);
        room.apply_move(board, Seat::A, 0);
        drain(&mut rx1);
        drain(&mut rx2);

        assert!(!room.request_switch("p2"));
        assert_eq!(room.occupant(Seat::A), Some("p1"));

        assert!(room.request_switch("p1"));
        assert_eq!(room.occupant(Seat::A), Some("p2"));
        assert_eq!(room.occupant(Seat::B), Some("p1"));
        assert!(room.switch_pending().is_empty());

        let switched = ServerMessage::Message {
            text: SEATS_SWITCHED_TEXT.to_string(),
        };
        assert_eq!(
            drain(&mut rx1),
            [
                ServerMessage::PlayerNumber {
                    player_number: Seat::B,
                    player_id: "p1".to_string()
                },
                switched.clone()
            ]
        );
        assert_eq!(
            drain(&mut rx2),
            [
                ServerMessage::PlayerNumber {
                    player_number: Seat::A,
                    player_id: "p2".to_string()
                },
                switched
            ]
        );

        assert_eq!(*room.board(), board);
        assert_eq!(room.turn(), Seat::B);
        assert_eq!(room.moves(), 1);
    }

    #[test]
    fn test_chat_is_relayed_to_everyone() {
        let (room, (_, mut rx1), (_, mut rx2)) = seated_room();
        room.relay_chat("good luck".to_string());
        let expected = ServerMessage::Message {
            text: "good luck".to_string(),
        };
        assert_eq!(drain(&mut rx1), [expected.clone()]);
        assert_eq!(drain(&mut rx2), [expected]);
    }

    #[test]
    fn test_sync_targets_one_connection() {
        let (room, (c1, mut rx1), (_, mut rx2)) = seated_room();
        room.sync(&c1);
        assert_eq!(kinds(&drain(&mut rx1)), ["syncState"]);
        assert!(drain(&mut rx2).is_empty());
    }

    #[test]
    fn test_snapshot_reports_finished_game() {
        let (mut room, _, _) = seated_room();
        let board = Board::try_from([[2, 2, 2], [1, 1, 0], [1, 0, 0]]).unwrap();
        room.apply_move(board, Seat::B, 5);
        room.play_again("p1");

        match room.snapshot() {
            ServerMessage::SyncState {
                winner_player,
                game_over,
                ready_to_play_again,
                ..
            } => {
                assert_eq!(winner_player, Some(Seat::B));
                assert!(game_over);
                assert_eq!(ready_to_play_again.get("p1"), Some(&true));
            }
            other => panic!("Expected SyncState, got {:?}", other),
        }
    }

    #[test]
    fn test_remove_connection_vacates_seat() {
        let (mut room, (c1, _), (c2, _)) = seated_room();

        assert_eq!(room.remove_connection(c2.id()), Some("p2".to_string()));
        assert_eq!(room.occupant(Seat::B), None);
        assert!(!room.is_vacant());

        assert_eq!(room.remove_connection(c1.id()), Some("p1".to_string()));
        assert!(room.is_vacant());
        assert_eq!(room.connection_count(), 0);

        assert_eq!(room.remove_connection(c1.id()), None);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let metrics = Arc::new(ServerMetrics::new());
        let (tx, _rx) = mpsc::channel(1);
        let conn = ConnectionHandle::new(ConnectionId::new(), tx, metrics.clone());

        assert!(conn.send(ServerMessage::Reset));
        assert!(!conn.send(ServerMessage::Reset));
        assert_eq!(metrics.snapshot().messages.dropped, 1);
    }

    #[test]
    fn test_rejection_closes_even_with_full_queue() {
        let (tx, mut rx) = mpsc::channel(1);
        let conn = ConnectionHandle::new(ConnectionId::new(), tx, Arc::new(ServerMetrics::new()));
        assert!(conn.send(ServerMessage::Reset));

        let (mut room, _, _) = seated_room();
        assert!(room.join("p3", &conn).is_err());

        // The error message is dropped, the close is not.
        assert_eq!(drain(&mut rx), [ServerMessage::Reset]);
        assert!(conn.is_closing());
        assert!(conn.close_token().is_cancelled());
    }

    #[test]
    fn test_pending_rematch_survives_partner_disconnect() {
        let (mut room, _, (c2, _)) = seated_room();
        let board = Board::try_from([[1, 1, 1], [2, 2, 0], [0, 0, 0]]).unwrap();
        room.apply_move(board, Seat::A, 4);

        assert!(!room.play_again("p1"));
        assert!(!room.request_switch("p1"));
        room.remove_connection(c2.id());

        let (c3, mut rx3) = test_connection();
        assert_eq!(room.join("p3", &c3), Ok(Seat::B));
        drain(&mut rx3);

        assert!(room.rematch_ready().contains("p1"));
        assert!(room.switch_pending().contains("p1"));
        assert_eq!(*room.board(), board);
        assert_eq!(room.moves(), 5);
        assert_eq!(room.occupant(Seat::A), Some("p1"));
        assert_eq!(room.occupant(Seat::B), Some("p3"));

        // The newcomer's vote completes the handshake still pending from p1.
        assert!(room.play_again("p3"));
        assert_eq!(drain(&mut rx3), [ServerMessage::Reset]);
    }

    #[test]
    fn test_repeated_switch_request_is_idempotent() {
        let (mut room, (_, mut rx1), (_, mut rx2)) = seated_room();

        assert!(!room.request_switch("p1"));
        assert!(!room.request_switch("p1"));
        assert_eq!(room.switch_pending().len(), 1);
        assert_eq!(room.occupant(Seat::A), Some("p1"));
        assert!(drain(&mut rx1).is_empty());
        assert!(drain(&mut rx2).is_empty());
    }

    #[test]
    fn test_unseated_votes_never_complete_a_handshake() {
        let (mut room, _, _) = seated_room();

        assert!(!room.play_again("p1"));
        assert!(!room.play_again("spectator"));
        assert!(!room.request_switch("p2"));
        assert!(!room.request_switch("spectator"));

        assert_eq!(room.occupant(Seat::A), Some("p1"));
        assert_eq!(room.occupant(Seat::B), Some("p2"));
        assert_eq!(room.rematch_ready().len(), 2);
        assert_eq!(room.switch_pending().len(), 2);
    }
}
