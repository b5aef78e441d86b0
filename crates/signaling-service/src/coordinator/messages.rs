//! Command, event and mailbox message types for the coordinator.
//!
//! `Command` is what a connection asks of the coordinator, `ServerEvent` is
//! what the coordinator tells a connection. Both are plain data so the state
//! machine can be driven and inspected without a live transport.

use crate::types::{ChannelKey, ChannelSnapshot, ConnectionContext, ConnectionId, UserData};

use super::registry::Outbox;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tokio::sync::oneshot;

/// A request from one connection, applied atomically against coordinator state.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Join the channel named by `channel` with initial metadata.
    Join { channel: String, user_data: UserData },

    /// Leave the channel named by `channel`.
    Part { channel: String },

    /// Set one metadata key on this connection's record in `channel`.
    UpdateUserData {
        channel: String,
        key: String,
        value: serde_json::Value,
    },

    /// Forward a connectivity candidate to `target`.
    RelayCandidate {
        target: ConnectionId,
        candidate: serde_json::Value,
    },

    /// Forward a session description to `target`.
    RelaySessionDescription {
        target: ConnectionId,
        session_description: serde_json::Value,
    },

    /// The transport reported the connection gone.
    Disconnect,
}

impl Command {
    /// Bounded label for metrics and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Command::Join { .. } => "join",
            Command::Part { .. } => "part",
            Command::UpdateUserData { .. } => "update_user_data",
            Command::RelayCandidate { .. } => "relay_candidate",
            Command::RelaySessionDescription { .. } => "relay_session_description",
            Command::Disconnect => "disconnect",
        }
    }
}

/// An event delivered to a single connection.
///
/// Serialized as `{"event": "<camelCaseName>", "data": {...}}` with
/// snake_case payload fields, the shape browser clients already speak.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// `peer_id` is now in a shared channel. Exactly one side of each pair is
    /// told to create the offer.
    AddPeer {
        peer_id: ConnectionId,
        should_create_offer: bool,
        #[serde(serialize_with = "serialize_snapshot")]
        channel: ChannelSnapshot,
    },

    /// `peer_id` no longer shares this channel.
    RemovePeer { peer_id: ConnectionId },

    /// Candidate relayed from `peer_id`.
    IceCandidate {
        peer_id: ConnectionId,
        ice_candidate: serde_json::Value,
    },

    /// Session description relayed from `peer_id`.
    SessionDescription {
        peer_id: ConnectionId,
        session_description: serde_json::Value,
    },
}

/// Writes a snapshot as `{"<id>": {"userData": {...}}}`.
fn serialize_snapshot<S: Serializer>(
    snapshot: &ChannelSnapshot,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Member<'a> {
        #[serde(rename = "userData")]
        user_data: &'a UserData,
    }

    let mut map = serializer.serialize_map(Some(snapshot.len()))?;
    for (id, user_data) in snapshot {
        map.serialize_entry(id, &Member { user_data })?;
    }
    map.end()
}

impl ServerEvent {
    /// Bounded label for metrics and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ServerEvent::AddPeer { .. } => "add_peer",
            ServerEvent::RemovePeer { .. } => "remove_peer",
            ServerEvent::IceCandidate { .. } => "ice_candidate",
            ServerEvent::SessionDescription { .. } => "session_description",
        }
    }
}

/// Messages sent to the `CoordinatorActor`.
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// Register a new connection and allocate its id.
    Register {
        context: ConnectionContext,
        outbox: Outbox,
        respond_to: oneshot::Sender<ConnectionId>,
    },

    /// Apply a command on behalf of a connection.
    Command {
        connection_id: ConnectionId,
        command: Command,
    },

    /// Read a channel's current member set.
    GetChannel {
        channel: ChannelKey,
        respond_to: oneshot::Sender<Option<ChannelSnapshot>>,
    },

    /// Get coordinator counters (for health and tests).
    GetStatus {
        respond_to: oneshot::Sender<CoordinatorStatus>,
    },

    /// Disconnect every registered connection and stop.
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Status of the `CoordinatorActor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorStatus {
    /// Registered connections.
    pub connection_count: usize,
    /// Non-empty channels in the directory.
    pub channel_count: usize,
    /// Sum of member-set sizes over all channels.
    pub membership_count: usize,
    /// Messages waiting in the coordinator mailbox.
    pub mailbox_depth: usize,
}
