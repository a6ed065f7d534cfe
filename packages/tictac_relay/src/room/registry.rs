//! Room Registry
//!
//! Process-wide map from room id to room. Lookups return the room's owned mutex
//! guard, so a handler keeps exclusive access to its room for the whole event.
//!
//! Deletion retires a room under its own lock before unlinking it. Anyone who
//! raced onto a retired room sees the flag, unlinks it if still present and
//! retries, so at most one live room exists per id.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use super::{ConnectionId, Room};
use crate::metrics::ServerMetrics;

pub type RoomGuard = OwnedMutexGuard<Room>;

/// A connection entry removed during disconnect cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room: String,
    pub player_id: String,
    pub room_deleted: bool,
}

pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Mutex<Room>>>>,
    metrics: Arc<ServerMetrics>,
}

impl RoomRegistry {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Lock the room, creating it first if the id is unknown.
    pub async fn get_or_create(&self, room_id: &str) -> RoomGuard {
        loop {
            let room = self.lookup_or_insert(room_id).await;
            let guard = room.clone().lock_owned().await;
            if !guard.is_retired() {
                return guard;
            }
            drop(guard);
            debug!(room = %room_id, "Raced with room deletion, retrying");
            self.unlink(room_id, &room).await;
        }
    }

    /// Lock an existing room. Never creates one.
    pub async fn get(&self, room_id: &str) -> Option<RoomGuard> {
        let room = self.rooms.read().await.get(room_id).cloned()?;
        let guard = room.lock_owned().await;
        (!guard.is_retired()).then_some(guard)
    }

    /// Remove a room. Returns false if there was nothing to remove.
    pub async fn delete(&self, room_id: &str) -> bool {
        let Some(room) = self.rooms.write().await.remove(room_id) else {
            return false;
        };
        let mut guard = room.lock().await;
        if guard.is_retired() {
            return false;
        }
        guard.retire();
        self.metrics.room_deleted();
        info!(room = %room_id, "Room deleted");
        true
    }

    /// Transport-close cleanup: drop `conn_id` from every room it is bound in,
    /// vacate the matching seats and delete rooms left with no seated player.
    pub async fn disconnect(&self, conn_id: ConnectionId) -> Vec<Departure> {
        let rooms: Vec<(String, Arc<Mutex<Room>>)> = self
            .rooms
            .read()
            .await
            .iter()
            .map(|(id, room)| (id.clone(), room.clone()))
            .collect();

        let mut departures = Vec::new();
        for (room_id, room) in rooms {
            let mut guard = room.lock().await;
            let Some(player_id) = guard.remove_connection(conn_id) else {
                continue;
            };

            let room_deleted = guard.is_vacant();
            if room_deleted {
                guard.retire();
                self.metrics.room_deleted();
                info!(room = %room_id, "Last player left, room deleted");
            }
            drop(guard);
            if room_deleted {
                self.unlink(&room_id, &room).await;
            }

            debug!(room = %room_id, player = %player_id, conn_id = %conn_id, "Connection released");
            departures.push(Departure {
                room: room_id,
                player_id,
                room_deleted,
            });
        }
        departures
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn lookup_or_insert(&self, room_id: &str) -> Arc<Mutex<Room>> {
        let existing = self.rooms.read().await.get(room_id).cloned();
        if let Some(room) = existing {
            return room;
        }

        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!(room = %room_id, "Room created");
                self.metrics.room_created();
                Arc::new(Mutex::new(Room::new(room_id)))
            })
            .clone()
    }

    /// Remove the map entry only if it still points at `room`.
    async fn unlink(&self, room_id: &str, room: &Arc<Mutex<Room>>) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.get(room_id) {
            Some(current) if Arc::ptr_eq(current, room) => {
                rooms.remove(room_id);
                true
            }
            _ => false,
        }
    }
}
