//! Relay server entry point.

use codraw_server::{AppState, app};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Default bind address; override with `CODRAW_ADDR`.
const DEFAULT_ADDR: &str = "0.0.0.0:5000";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codraw_server=info,tower_http=info".into()),
        )
        .init();

    let addr: SocketAddr = std::env::var("CODRAW_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .expect("CODRAW_ADDR must be a socket address like 0.0.0.0:5000");

    let state = Arc::new(AppState::new());

    info!("CoDraw relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app(state)).await.unwrap();
}
