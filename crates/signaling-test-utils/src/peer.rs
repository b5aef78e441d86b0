//! In-process test peer.
//!
//! A `TestPeer` registers with a `CoordinatorHandle` using a plain outbox and
//! exposes assertion helpers over the events it receives. No sockets are
//! involved, so coordinator behavior can be tested directly.

use serde_json::Value;
use signaling_service::coordinator::{Command, CoordinatorHandle, Outbox, ServerEvent};
use signaling_service::types::{ChannelSnapshot, ConnectionContext, ConnectionId, UserData};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long `expect_*` helpers wait for an event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(1);

/// Outbox capacity for test peers.
pub const TEST_OUTBOX_CAPACITY: usize = 64;

/// A registered connection that records its events.
pub struct TestPeer {
    pub id: ConnectionId,
    events: mpsc::Receiver<ServerEvent>,
}

impl TestPeer {
    /// Register a peer with a local context.
    pub async fn connect(coordinator: &CoordinatorHandle) -> Self {
        Self::connect_with(coordinator, ConnectionContext::local(), TEST_OUTBOX_CAPACITY).await
    }

    /// Register a peer with an explicit context and outbox capacity.
    pub async fn connect_with(
        coordinator: &CoordinatorHandle,
        context: ConnectionContext,
        capacity: usize,
    ) -> Self {
        let (outbox, events) = Outbox::channel(capacity);
        let id = coordinator
            .register(context, outbox)
            .await
            .expect("register failed");
        Self { id, events }
    }

    /// Join `channel` and wait until the coordinator has applied it.
    pub async fn join(&self, coordinator: &CoordinatorHandle, channel: &str, user_data: UserData) {
        self.submit(
            coordinator,
            Command::Join {
                channel: channel.to_string(),
                user_data,
            },
        )
        .await;
    }

    /// Part `channel` and wait until the coordinator has applied it.
    pub async fn part(&self, coordinator: &CoordinatorHandle, channel: &str) {
        self.submit(
            coordinator,
            Command::Part {
                channel: channel.to_string(),
            },
        )
        .await;
    }

    /// Submit a command and wait until it has been applied.
    pub async fn submit(&self, coordinator: &CoordinatorHandle, command: Command) {
        coordinator
            .submit(self.id, command)
            .await
            .expect("submit failed");
        // The mailbox is FIFO, so a status round trip means the command ran
        coordinator.status().await.expect("status failed");
    }

    /// Next event, or `None` after `timeout`.
    pub async fn next_event(&mut self, timeout: Duration) -> Option<ServerEvent> {
        tokio::time::timeout(timeout, self.events.recv())
            .await
            .ok()
            .flatten()
    }

    /// Everything currently queued.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Expect `addPeer` for `peer_id`; returns the offer flag and snapshot.
    pub async fn expect_add_peer(&mut self, peer_id: ConnectionId) -> (bool, ChannelSnapshot) {
        match self.next_event(EVENT_TIMEOUT).await {
            Some(ServerEvent::AddPeer {
                peer_id: got,
                should_create_offer,
                channel,
            }) if got == peer_id => (should_create_offer, channel),
            other => panic!("expected addPeer({peer_id}), got {other:?}"),
        }
    }

    /// Expect `removePeer` for `peer_id`.
    pub async fn expect_remove_peer(&mut self, peer_id: ConnectionId) {
        match self.next_event(EVENT_TIMEOUT).await {
            Some(ServerEvent::RemovePeer { peer_id: got }) if got == peer_id => {}
            other => panic!("expected removePeer({peer_id}), got {other:?}"),
        }
    }

    /// Expect a session description relayed from `from`; returns the payload.
    pub async fn expect_session_description(&mut self, from: ConnectionId) -> Value {
        match self.next_event(EVENT_TIMEOUT).await {
            Some(ServerEvent::SessionDescription {
                peer_id,
                session_description,
            }) if peer_id == from => session_description,
            other => panic!("expected sessionDescription from {from}, got {other:?}"),
        }
    }

    /// Expect a candidate relayed from `from`; returns the payload.
    pub async fn expect_ice_candidate(&mut self, from: ConnectionId) -> Value {
        match self.next_event(EVENT_TIMEOUT).await {
            Some(ServerEvent::IceCandidate {
                peer_id,
                ice_candidate,
            }) if peer_id == from => ice_candidate,
            other => panic!("expected iceCandidate from {from}, got {other:?}"),
        }
    }

    /// Assert nothing arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Some(event) = self.next_event(window).await {
            panic!("expected no events, got {event:?}");
        }
    }
}
