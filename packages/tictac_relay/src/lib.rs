//! Two-player tic-tac-toe room relay.
//!
//! Browsers connect over one WebSocket, join a room by name, and the relay
//! keeps each room's board, seats and rematch/seat-swap handshakes while
//! broadcasting every accepted event to the room's connections.

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

pub mod board;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod room;
pub mod ws;

use crate::config::RelayConfig;
use crate::metrics::ServerMetrics;
use crate::room::RoomRegistry;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub config: Arc<RelayConfig>,
    pub metrics: Arc<ServerMetrics>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let metrics = Arc::new(ServerMetrics::new());
        Self {
            registry: Arc::new(RoomRegistry::new(metrics.clone())),
            config: Arc::new(config),
            metrics,
        }
    }
}

/// The relay's HTTP surface. The game socket is served on both `/` and `/ws`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::room_websocket_handler))
        .route("/ws", get(handlers::room_websocket_handler))
        // Health endpoints
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
