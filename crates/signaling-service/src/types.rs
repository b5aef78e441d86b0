//! Identifier and payload types shared by the coordinator and the transport.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use uuid::Uuid;

/// Unique identifier for a live connection.
///
/// Valid for the lifetime of one transport session only. A reconnecting
/// client always receives a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Key of a channel in the directory, produced by a [`crate::coordinator::ChannelScope`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelKey(pub String);

impl ChannelKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-membership peer metadata (display name, audio/video flags, ...).
pub type UserData = serde_json::Map<String, serde_json::Value>;

/// Point-in-time copy of a channel's member set.
pub type ChannelSnapshot = BTreeMap<ConnectionId, UserData>;

/// Transport-level facts about a connection, captured at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionContext {
    /// Socket address of the remote end, if known.
    pub remote_addr: Option<SocketAddr>,
    /// First hop of the `X-Forwarded-For` header, if present.
    pub forwarded_for: Option<String>,
}

impl ConnectionContext {
    /// Context for connections with no network identity (tests, in-process peers).
    #[must_use]
    pub fn local() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_connection_id_serializes_as_string() {
        let id = ConnectionId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));

        let parsed: ConnectionId = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_snapshot_serializes_keyed_by_id() {
        let id = ConnectionId::new();
        let mut data = UserData::new();
        data.insert("name".to_string(), serde_json::json!("Alice"));
        let snapshot = ChannelSnapshot::from([(id, data)]);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json[id.to_string()]["name"], "Alice");
    }
}
