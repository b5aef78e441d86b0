//! Metadata store: one `PeerRecord` per (connection, channel) membership.
//!
//! Updates are stored only. Peers learn about changes over their own
//! established transport, so `update_user_data` never emits events.

use crate::types::{ChannelKey, ConnectionId, UserData};

use super::state::{CoordinatorState, Delivery};

use tracing::debug;

/// A connection's identity and metadata within one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    pub connection_id: ConnectionId,
    pub user_data: UserData,
}

impl PeerRecord {
    #[must_use]
    pub fn new(connection_id: ConnectionId, user_data: UserData) -> Self {
        Self {
            connection_id,
            user_data,
        }
    }

    /// Set `key` to `value`, returning the previous value.
    pub fn set(&mut self, key: String, value: serde_json::Value) -> Option<serde_json::Value> {
        self.user_data.insert(key, value)
    }
}

impl CoordinatorState {
    /// Set one metadata key on `connection_id`'s record in `channel`.
    ///
    /// A no-op when the connection is not a member of the channel.
    pub(super) fn update_user_data(
        &mut self,
        connection_id: ConnectionId,
        channel: &ChannelKey,
        key: String,
        value: serde_json::Value,
    ) -> Vec<Delivery> {
        match self.directory.record_mut(channel, &connection_id) {
            Some(record) => {
                record.set(key, value);
            }
            None => {
                debug!(
                    target: "signaling.coordinator",
                    connection_id = %connection_id,
                    channel = %channel,
                    "User data update outside membership ignored"
                );
            }
        }
        Vec::new()
    }
}
