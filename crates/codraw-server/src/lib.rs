//! CoDraw WebSocket fan-out relay.
//!
//! The hub is stateless by design: every Text frame received on any
//! connection is rebroadcast verbatim to every live connection, sender
//! included, in hub-arrival order. No schema validation, no document state,
//! no backlog for late joiners. A dropped connection is simply removed from
//! the fan-out set.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

/// Capacity of the fan-out channel. A peer that falls further behind than
/// this starts losing events (logged, not recovered).
const CHANNEL_CAPACITY: usize = 256;

/// Shared relay state.
pub struct AppState {
    /// Fan-out channel carrying raw frames in hub-arrival order.
    tx: broadcast::Sender<Utf8Bytes>,
    /// Connected peers.
    peers: DashMap<String, ()>,
}

impl AppState {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: DashMap::new(),
        }
    }

    /// Number of currently connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the relay router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "CoDraw Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection until it closes.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    // Subscribed before the peer is registered or any of its frames are
    // read, so a registered peer always observes subsequent events,
    // its own included (self-inclusive broadcast).
    let mut rx = state.tx.subscribe();
    state.peers.insert(peer_id.clone(), ());
    info!("peer {} connected ({} online)", peer_id, state.peer_count());

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Frames from this peer: relay verbatim. Malformed payloads are
            // forwarded as-is; validation happens at the consuming client.
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = state.tx.send(text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary, ping/pong
                    Some(Err(e)) => {
                        warn!("transport error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Frames relayed from any peer, this one included.
            frame = rx.recv() => {
                match frame {
                    Ok(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("peer {} lagged, {} events dropped", peer_id, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    state.peers.remove(&peer_id);
    info!("peer {} disconnected ({} online)", peer_id, state.peer_count());
}
