//! WebSocket test client.
//!
//! Speaks the same JSON frames a browser does, so end-to-end tests exercise
//! the real codec and socket handling.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use signaling_service::types::UserData;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long `recv_*` helpers wait for a frame.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// A connected WebSocket client.
pub struct TestClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Connect to a `ws://` URL.
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", url, e))?;
        Ok(Self { socket })
    }

    /// Connect with extra request headers such as `Origin`.
    pub async fn connect_with_headers(
        url: &str,
        headers: &[(&'static str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let mut request = url
            .into_client_request()
            .map_err(|e| anyhow::anyhow!("Invalid URL {}: {}", url, e))?;
        for (name, value) in headers {
            request.headers_mut().insert(
                *name,
                value
                    .parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid header {}: {}", name, e))?,
            );
        }
        let (socket, _response) = connect_async(request)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", url, e))?;
        Ok(Self { socket })
    }

    /// Send a raw text frame.
    pub async fn send_text(&mut self, text: &str) {
        self.socket
            .send(Message::Text(text.to_string()))
            .await
            .expect("send failed");
    }

    /// Send a binary frame.
    pub async fn send_binary(&mut self, bytes: Vec<u8>) {
        self.socket
            .send(Message::Binary(bytes))
            .await
            .expect("send failed");
    }

    /// Send `{"event": event, "data": data}`.
    pub async fn send_event(&mut self, event: &str, data: Value) {
        let frame = json!({ "event": event, "data": data });
        self.send_text(&frame.to_string()).await;
    }

    pub async fn join(&mut self, channel: &str, user_data: UserData) {
        self.send_event("join", json!({ "channel": channel, "userData": user_data }))
            .await;
    }

    pub async fn part(&mut self, channel: &str) {
        self.send_event("part", json!({ "channel": channel })).await;
    }

    pub async fn relay_session_description(&mut self, peer_id: &str, session_description: Value) {
        self.send_event(
            "relaySessionDescription",
            json!({ "peer_id": peer_id, "session_description": session_description }),
        )
        .await;
    }

    pub async fn relay_ice_candidate(&mut self, peer_id: &str, ice_candidate: Value) {
        self.send_event(
            "relayICECandidate",
            json!({ "peer_id": peer_id, "ice_candidate": ice_candidate }),
        )
        .await;
    }

    /// Next JSON text frame, or `None` on timeout or close.
    pub async fn recv_json(&mut self, timeout: Duration) -> Option<Value> {
        loop {
            let frame = tokio::time::timeout(timeout, self.socket.next())
                .await
                .ok()??;
            match frame {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(&text).expect("server sent invalid JSON"));
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                Ok(_) | Err(_) => return None,
            }
        }
    }

    /// Expect an event named `event`; returns its `data`.
    pub async fn expect_event(&mut self, event: &str) -> Value {
        let frame = self
            .recv_json(FRAME_TIMEOUT)
            .await
            .unwrap_or_else(|| panic!("expected {event}, got nothing"));
        assert_eq!(frame["event"], event, "unexpected frame {frame}");
        frame["data"].clone()
    }

    /// Assert no frame arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Some(frame) = self.recv_json(window).await {
            panic!("expected no frames, got {frame}");
        }
    }

    /// True once the server has closed the socket.
    pub async fn expect_closed(&mut self, timeout: Duration) -> bool {
        loop {
            match tokio::time::timeout(timeout, self.socket.next()).await {
                Err(_) => return false,
                Ok(None | Some(Err(_)) | Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    /// Send a close frame.
    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}
