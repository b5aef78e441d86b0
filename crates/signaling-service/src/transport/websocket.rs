//! WebSocket connection handling.
//!
//! Each upgraded socket is split in two. A writer task drains the
//! connection's outbox into text frames; the reader loop decodes inbound
//! frames and submits them to the coordinator. When the reader stops (close
//! frame, stream end, read error or server shutdown) the connection submits
//! `Disconnect` once and lets the writer drain.

use crate::coordinator::{CoordinatorHandle, Outbox, ServerEvent};
use crate::observability::metrics;
use crate::types::{ConnectionContext, ConnectionId};

use super::protocol;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Span};

/// How long the writer may keep flushing after the reader has stopped.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared state for the signaling router.
#[derive(Clone, Debug)]
pub struct TransportState {
    pub coordinator: CoordinatorHandle,
    /// Per-connection outbox bound.
    pub outbox_capacity: usize,
    /// Largest accepted inbound frame.
    pub max_message_bytes: usize,
    /// Browser origins allowed to connect; `None` allows any.
    pub allowed_origins: Option<Arc<[String]>>,
    /// Cancelled when the server starts shutting down.
    pub shutdown: CancellationToken,
}

/// Why a connection's reader loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    ReadError,
    Shutdown,
    CoordinatorGone,
}

impl CloseReason {
    const fn as_str(self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::ReadError => "read_error",
            CloseReason::Shutdown => "shutdown",
            CloseReason::CoordinatorGone => "coordinator_gone",
        }
    }
}

/// `GET /ws` upgrade handler.
///
/// Refuses the upgrade with 403 when an allow-list is configured and the
/// request's `Origin` is missing or not on it.
pub async fn websocket_handler(
    State(state): State<TransportState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let remote_addr = connect_info.map(|ConnectInfo(addr)| addr);

    if let Some(allowed) = state.allowed_origins.as_deref() {
        let origin = headers.get(ORIGIN).and_then(|value| value.to_str().ok());
        if !origin_allowed(allowed, origin) {
            warn!(
                target: "signaling.transport",
                origin = ?origin,
                remote_addr = ?remote_addr,
                "WebSocket upgrade refused, origin not allowed"
            );
            metrics::record_connection_rejected("origin_not_allowed");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let context = ConnectionContext {
        remote_addr,
        forwarded_for: forwarded_for(&headers),
    };

    ws.max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, context))
}

/// Whether `origin` matches an entry of `allowed`, ignoring a trailing slash.
fn origin_allowed(allowed: &[String], origin: Option<&str>) -> bool {
    let Some(origin) = origin.map(|o| o.trim_end_matches('/')) else {
        return false;
    };
    allowed.iter().any(|entry| entry.eq_ignore_ascii_case(origin))
}

/// First hop of `X-Forwarded-For`, if present.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
}

#[instrument(
    skip_all,
    name = "signaling.transport.connection",
    fields(connection_id = tracing::field::Empty)
)]
async fn handle_socket(socket: WebSocket, state: TransportState, context: ConnectionContext) {
    let remote_addr = context.remote_addr;
    let (outbox, events) = Outbox::channel(state.outbox_capacity);

    let connection_id = match state.coordinator.register(context, outbox).await {
        Ok(id) => id,
        Err(e) => {
            warn!(
                target: "signaling.transport",
                error = %e,
                "Could not register connection"
            );
            return;
        }
    };
    Span::current().record("connection_id", tracing::field::display(connection_id));

    info!(
        target: "signaling.transport",
        connection_id = %connection_id,
        remote_addr = ?remote_addr,
        "WebSocket connection established"
    );

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_events(sink, events, connection_id));

    let reason = read_commands(stream, &state, connection_id).await;

    if let Err(e) = state.coordinator.disconnect(connection_id).await {
        debug!(
            target: "signaling.transport",
            connection_id = %connection_id,
            error = %e,
            "Disconnect not delivered"
        );
    }

    // The writer ends once the coordinator releases the outbox
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }

    info!(
        target: "signaling.transport",
        connection_id = %connection_id,
        reason = reason.as_str(),
        "WebSocket connection closed"
    );
}

async fn read_commands(
    mut stream: SplitStream<WebSocket>,
    state: &TransportState,
    connection_id: ConnectionId,
) -> CloseReason {
    loop {
        let frame = tokio::select! {
            () = state.shutdown.cancelled() => return CloseReason::Shutdown,
            frame = stream.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(_))) => {
                reject_frame(connection_id, "binary frames are not supported");
                continue;
            }
            Some(Ok(Message::Close(_))) | None => return CloseReason::ClientClosed,
            // Ping/pong are answered by the WebSocket layer
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(
                    target: "signaling.transport",
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket read failed"
                );
                return CloseReason::ReadError;
            }
        };

        let command = match protocol::decode(&text) {
            Ok(command) => command,
            Err(e) if e.is_frame_local() => {
                reject_frame(connection_id, &e.to_string());
                continue;
            }
            Err(e) => {
                warn!(
                    target: "signaling.transport",
                    connection_id = %connection_id,
                    error = %e,
                    "Frame decode failed"
                );
                return CloseReason::ReadError;
            }
        };

        if let Err(e) = state.coordinator.submit(connection_id, command).await {
            warn!(
                target: "signaling.transport",
                connection_id = %connection_id,
                error = %e,
                "Coordinator rejected command"
            );
            return CloseReason::CoordinatorGone;
        }
    }
}

fn reject_frame(connection_id: ConnectionId, error: &str) {
    warn!(
        target: "signaling.transport",
        connection_id = %connection_id,
        error = %error,
        "Malformed message ignored"
    );
    metrics::record_malformed_message();
}

async fn write_events(
    mut sink: SplitSink<WebSocket, Message>,
    mut events: mpsc::Receiver<ServerEvent>,
    connection_id: ConnectionId,
) {
    while let Some(event) = events.recv().await {
        let text = match protocol::encode(&event) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    target: "signaling.transport",
                    connection_id = %connection_id,
                    event = event.name(),
                    error = %e,
                    "Event not encodable, skipped"
                );
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(text)).await {
            debug!(
                target: "signaling.transport",
                connection_id = %connection_id,
                error = %e,
                "WebSocket write failed"
            );
            return;
        }
    }

    let _ = sink.close().await;
}
