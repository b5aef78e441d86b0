//! Test server harness for end-to-end testing.
//!
//! Provides `TestSignalingServer` for spawning a real signaling server in
//! tests.

use signaling_service::coordinator::{ChannelScope, CoordinatorHandle, RoomScope};
use signaling_service::transport::{signaling_router, TransportState};
use signaling_service::types::ChannelKey;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A signaling server bound to 127.0.0.1 on a random port.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_banner() -> Result<(), anyhow::Error> {
///     let server = TestSignalingServer::spawn().await?;
///     let mut client = TestClient::connect(&server.ws_url()).await?;
///     client.join("room1", user_data("Alice")).await;
///     Ok(())
/// }
/// ```
pub struct TestSignalingServer {
    addr: SocketAddr,
    coordinator: CoordinatorHandle,
    shutdown: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestSignalingServer {
    /// Spawn with room scoping and default limits.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(Arc::new(RoomScope), 256, 64 * 1024).await
    }

    /// Spawn with an explicit scope, outbox capacity and message size limit.
    pub async fn spawn_with(
        scope: Arc<dyn ChannelScope>,
        outbox_capacity: usize,
        max_message_bytes: usize,
    ) -> Result<Self, anyhow::Error> {
        Self::start(scope, outbox_capacity, max_message_bytes, None).await
    }

    /// Spawn with room scoping that only accepts upgrades from `origins`.
    pub async fn spawn_with_allowed_origins(origins: &[&str]) -> Result<Self, anyhow::Error> {
        let allowed: Vec<String> = origins.iter().map(|o| (*o).to_string()).collect();
        Self::start(Arc::new(RoomScope), 256, 64 * 1024, Some(Arc::from(allowed))).await
    }

    async fn start(
        scope: Arc<dyn ChannelScope>,
        outbox_capacity: usize,
        max_message_bytes: usize,
        allowed_origins: Option<Arc<[String]>>,
    ) -> Result<Self, anyhow::Error> {
        let coordinator = CoordinatorHandle::new("signaling-test".to_string(), scope);
        let shutdown = coordinator.child_token();

        let app = signaling_router(TransportState {
            coordinator: coordinator.clone(),
            outbox_capacity,
            max_message_bytes,
            allowed_origins,
            shutdown: shutdown.clone(),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            // Connect info lets origin scoping see the peer address
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            coordinator,
            shutdown,
            _handle: handle,
        })
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    /// Stop every connection's reader, as the binary does on SIGTERM.
    pub fn begin_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Poll until `channel` has exactly `members` members.
    ///
    /// Commands from different sockets race to the coordinator, so tests use
    /// this to pin down join order.
    pub async fn wait_for_members(&self, channel: &str, members: usize) {
        let key = ChannelKey::from(channel);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let count = self
                .coordinator
                .channel_snapshot(key.clone())
                .await
                .expect("coordinator unavailable")
                .map_or(0, |snapshot| snapshot.len());
            if count == members {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "channel {channel} has {count} members, expected {members}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until the coordinator has exactly `connections` registered.
    pub async fn wait_for_connections(&self, connections: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let count = self
                .coordinator
                .status()
                .await
                .expect("coordinator unavailable")
                .connection_count;
            if count == connections {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "{count} connections registered, expected {connections}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for TestSignalingServer {
    fn drop(&mut self) {
        self.coordinator.cancel();
        self._handle.abort();
    }
}
