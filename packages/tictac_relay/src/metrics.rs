//! Server metrics for observability
//!
//! Relaxed atomic counters, snapshotted into serializable structs for `/metrics`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Room metrics
    pub active_rooms: AtomicU64,
    pub rooms_created: AtomicU64,
    pub rooms_deleted: AtomicU64,

    // Message metrics
    /// Text frames received from clients
    pub messages_received: AtomicU64,
    /// Frames written to clients
    pub messages_sent: AtomicU64,
    /// Outbound messages dropped because a client queue was full or gone
    pub messages_dropped: AtomicU64,
    /// Inbound frames that did not decode into a known event
    pub messages_malformed: AtomicU64,

    // Game metrics
    pub admissions_rejected: AtomicU64,
    pub games_finished: AtomicU64,
    pub draws: AtomicU64,
    pub rematches: AtomicU64,
    pub seat_swaps: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // Room tracking
    pub fn room_created(&self) {
        self.active_rooms.fetch_add(1, Ordering::Relaxed);
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn room_deleted(&self) {
        self.active_rooms.fetch_sub(1, Ordering::Relaxed);
        self.rooms_deleted.fetch_add(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_malformed(&self) {
        self.messages_malformed.fetch_add(1, Ordering::Relaxed);
    }

    // Game tracking
    pub fn admission_rejected(&self) {
        self.admissions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn game_finished(&self, draw: bool) {
        self.games_finished.fetch_add(1, Ordering::Relaxed);
        if draw {
            self.draws.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn rematch_started(&self) {
        self.rematches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn seats_swapped(&self) {
        self.seat_swaps.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            rooms: RoomMetrics {
                active: self.active_rooms.load(Ordering::Relaxed),
                created: self.rooms_created.load(Ordering::Relaxed),
                deleted: self.rooms_deleted.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.messages_received.load(Ordering::Relaxed),
                sent: self.messages_sent.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
                malformed: self.messages_malformed.load(Ordering::Relaxed),
            },
            games: GameMetrics {
                finished: self.games_finished.load(Ordering::Relaxed),
                draws: self.draws.load(Ordering::Relaxed),
                rematches: self.rematches.load(Ordering::Relaxed),
                seat_swaps: self.seat_swaps.load(Ordering::Relaxed),
                admissions_rejected: self.admissions_rejected.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub rooms: RoomMetrics,
    pub messages: MessageMetrics,
    pub games: GameMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMetrics {
    pub active: u64,
    pub created: u64,
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub sent: u64,
    pub dropped: u64,
    pub malformed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMetrics {
    pub finished: u64,
    pub draws: u64,
    pub rematches: u64,
    pub seat_swaps: u64,
    pub admissions_rejected: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub rooms: u64,
    pub connections: u64,
    pub uptime_secs: u64,
}
