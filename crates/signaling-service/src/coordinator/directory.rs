//! Channel directory: channel key to member set.
//!
//! A channel exists exactly while it has members. `insert_member` creates it
//! on first join and `remove_member` deletes it when the last member leaves,
//! so a later join always starts from an empty member set.

use crate::types::{ChannelKey, ChannelSnapshot, ConnectionId};

use super::metadata::PeerRecord;

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Members of one channel, ordered by connection id.
#[derive(Debug, Default)]
pub struct Channel {
    members: BTreeMap<ConnectionId, PeerRecord>,
}

impl Channel {
    /// Copy of the member set as id to metadata.
    #[must_use]
    pub fn snapshot(&self) -> ChannelSnapshot {
        self.members
            .iter()
            .map(|(id, record)| (*id, record.user_data.clone()))
            .collect()
    }

    pub fn member_ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.members.keys().copied()
    }

    #[must_use]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// All non-empty channels.
#[derive(Debug, Default)]
pub struct ChannelDirectory {
    channels: HashMap<ChannelKey, Channel>,
}

impl ChannelDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` into `key`, creating the channel if absent.
    ///
    /// Returns the channel after insertion, or `None` if the connection was
    /// already a member (the existing record is left untouched).
    pub fn insert_member(&mut self, key: &ChannelKey, record: PeerRecord) -> Option<&Channel> {
        let channel = self.channels.entry(key.clone()).or_insert_with(|| {
            debug!(
                target: "signaling.coordinator",
                channel = %key,
                "Channel created"
            );
            Channel::default()
        });

        if channel.contains(&record.connection_id) {
            return None;
        }
        channel.members.insert(record.connection_id, record);
        Some(channel)
    }

    /// Remove `id` from `key`, deleting the channel if it becomes empty.
    ///
    /// Returns the remaining member ids, or `None` if `id` was not a member.
    pub fn remove_member(
        &mut self,
        key: &ChannelKey,
        id: &ConnectionId,
    ) -> Option<Vec<ConnectionId>> {
        let channel = self.channels.get_mut(key)?;
        channel.members.remove(id)?;

        let remaining: Vec<ConnectionId> = channel.member_ids().collect();
        if channel.is_empty() {
            self.channels.remove(key);
            debug!(
                target: "signaling.coordinator",
                channel = %key,
                "Channel removed"
            );
        }
        Some(remaining)
    }

    #[must_use]
    pub fn get(&self, key: &ChannelKey) -> Option<&Channel> {
        self.channels.get(key)
    }

    pub fn record_mut(&mut self, key: &ChannelKey, id: &ConnectionId) -> Option<&mut PeerRecord> {
        self.channels.get_mut(key)?.members.get_mut(id)
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Sum of member-set sizes.
    #[must_use]
    pub fn membership_count(&self) -> usize {
        self.channels.values().map(Channel::len).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::types::UserData;

    fn record(id: ConnectionId) -> PeerRecord {
        PeerRecord::new(id, UserData::new())
    }

    #[test]
    fn test_channel_created_on_first_insert() {
        let mut directory = ChannelDirectory::new();
        let key = ChannelKey::from("room1");
        assert!(directory.get(&key).is_none());

        let a = ConnectionId::new();
        let channel = directory.insert_member(&key, record(a)).unwrap();
        assert_eq!(channel.len(), 1);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_keeps_existing_record() {
        let mut directory = ChannelDirectory::new();
        let key = ChannelKey::from("room1");
        let a = ConnectionId::new();

        let mut first = UserData::new();
        first.insert("name".to_string(), serde_json::json!("Alice"));
        directory.insert_member(&key, PeerRecord::new(a, first));

        assert!(directory.insert_member(&key, record(a)).is_none());
        let snapshot = directory.get(&key).unwrap().snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&a]["name"], "Alice");
    }

    #[test]
    fn test_channel_deleted_when_last_member_removed() {
        let mut directory = ChannelDirectory::new();
        let key = ChannelKey::from("room1");
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        directory.insert_member(&key, record(a));
        directory.insert_member(&key, record(b));

        assert_eq!(directory.remove_member(&key, &a).unwrap(), vec![b]);
        assert!(directory.get(&key).is_some());

        assert!(directory.remove_member(&key, &b).unwrap().is_empty());
        assert!(directory.get(&key).is_none());
        assert!(directory.is_empty());
    }

    #[test]
    fn test_remove_non_member_is_none() {
        let mut directory = ChannelDirectory::new();
        let key = ChannelKey::from("room1");
        assert!(directory.remove_member(&key, &ConnectionId::new()).is_none());

        directory.insert_member(&key, record(ConnectionId::new()));
        assert!(directory.remove_member(&key, &ConnectionId::new()).is_none());
        assert_eq!(directory.membership_count(), 1);
    }
}
