//! WebSocket transport boundary.
//!
//! Frames in, commands out; events in, frames out. Nothing here touches
//! channel state directly.

pub mod protocol;
pub mod websocket;

pub use websocket::{websocket_handler, TransportState};

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// One-line banner served at `/`.
pub const BANNER: &str = "signaling-service: connect a WebSocket to /ws\n";

/// Router with the `/ws` upgrade endpoint and the `/` banner.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// origin scoping can see the peer address.
pub fn signaling_router(state: TransportState) -> Router {
    Router::new()
        .route("/", get(|| async { BANNER }))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
