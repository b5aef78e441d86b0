//! Coordinator state and the command state machine.
//!
//! `CoordinatorState::apply` is synchronous: it commits the transition and
//! returns the events it produced as a list of [`Delivery`] values. Sending
//! those deliveries is a separate step, so no recipient is ever contacted
//! while state is being mutated.

use crate::types::{ChannelKey, ChannelSnapshot, ConnectionContext, ConnectionId};

use super::directory::ChannelDirectory;
use super::messages::{Command, CoordinatorStatus, ServerEvent};
use super::registry::{ConnectionRegistry, DeliveryOutcome, Outbox};
use super::relay::NegotiationKind;
use super::scope::ChannelScope;

use std::sync::Arc;
use tracing::debug;

/// One event addressed to one connection.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipient: ConnectionId,
    pub outbox: Outbox,
    pub event: ServerEvent,
}

impl Delivery {
    /// Hand the event to the recipient's outbox without waiting.
    pub fn dispatch(self) -> DeliveryOutcome {
        self.outbox.try_deliver(self.event)
    }
}

/// Registry, directory and scoping function for one signaling domain.
#[derive(Debug)]
pub struct CoordinatorState {
    pub(super) registry: ConnectionRegistry,
    pub(super) directory: ChannelDirectory,
    scope: Arc<dyn ChannelScope>,
}

impl CoordinatorState {
    #[must_use]
    pub fn new(scope: Arc<dyn ChannelScope>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            directory: ChannelDirectory::new(),
            scope,
        }
    }

    /// Register a connection.
    pub fn register(&mut self, context: ConnectionContext, outbox: Outbox) -> ConnectionId {
        self.registry.register(context, outbox)
    }

    /// Apply one command from `connection_id`.
    ///
    /// Commands from connections that are not registered are ignored.
    pub fn apply(&mut self, connection_id: ConnectionId, command: Command) -> Vec<Delivery> {
        if !self.registry.contains(&connection_id) {
            debug!(
                target: "signaling.coordinator",
                connection_id = %connection_id,
                command = command.name(),
                "Command from unregistered connection ignored"
            );
            return Vec::new();
        }

        match command {
            Command::Join { channel, user_data } => {
                let key = self.channel_key(&connection_id, &channel);
                self.join(connection_id, &key, user_data)
            }
            Command::Part { channel } => {
                let key = self.channel_key(&connection_id, &channel);
                self.part(connection_id, &key)
            }
            Command::UpdateUserData {
                channel,
                key,
                value,
            } => {
                let channel_key = self.channel_key(&connection_id, &channel);
                self.update_user_data(connection_id, &channel_key, key, value)
            }
            Command::RelayCandidate { target, candidate } => {
                self.relay(connection_id, NegotiationKind::Candidate, target, candidate)
            }
            Command::RelaySessionDescription {
                target,
                session_description,
            } => self.relay(
                connection_id,
                NegotiationKind::SessionDescription,
                target,
                session_description,
            ),
            Command::Disconnect => self.disconnect(connection_id),
        }
    }

    /// Current member set of a channel, if it exists.
    #[must_use]
    pub fn channel_snapshot(&self, key: &ChannelKey) -> Option<ChannelSnapshot> {
        self.directory.get(key).map(super::directory::Channel::snapshot)
    }

    /// Channels `connection_id` belongs to, from the registry's inverse index.
    #[must_use]
    pub fn joined_channels(&self, connection_id: &ConnectionId) -> Vec<ChannelKey> {
        let mut keys: Vec<ChannelKey> = self
            .registry
            .lookup(connection_id)
            .map(|entry| entry.channels.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn is_registered(&self, connection_id: &ConnectionId) -> bool {
        self.registry.contains(connection_id)
    }

    /// Ids of every registered connection.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.registry.ids()
    }

    #[must_use]
    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            connection_count: self.registry.len(),
            channel_count: self.directory.len(),
            membership_count: self.directory.membership_count(),
            mailbox_depth: 0,
        }
    }

    /// Scope a room token using the connection's registered context.
    fn channel_key(&self, connection_id: &ConnectionId, room: &str) -> ChannelKey {
        match self.registry.lookup(connection_id) {
            Some(entry) => self.scope.scope(&entry.context, room),
            None => self.scope.scope(&ConnectionContext::local(), room),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::coordinator::scope::{OriginScope, RoomScope};
    use crate::types::UserData;
    use serde_json::json;

    fn state() -> CoordinatorState {
        CoordinatorState::new(Arc::new(RoomScope))
    }

    fn connect(state: &mut CoordinatorState) -> ConnectionId {
        let (outbox, _rx) = Outbox::channel(16);
        state.register(ConnectionContext::local(), outbox)
    }

    fn join(channel: &str, name: &str) -> Command {
        let mut user_data = UserData::new();
        user_data.insert("name".to_string(), json!(name));
        Command::Join {
            channel: channel.to_string(),
            user_data,
        }
    }

    #[test]
    fn test_commands_from_unregistered_connection_are_ignored() {
        let mut state = state();
        let ghost = ConnectionId::new();

        assert!(state.apply(ghost, join("room1", "Ghost")).is_empty());
        assert_eq!(state.status(), CoordinatorStatus::default());
    }

    #[test]
    fn test_membership_counts_follow_distinct_joins_and_parts() {
        let mut state = state();
        let ids: Vec<ConnectionId> = (0..4).map(|_| connect(&mut state)).collect();

        for id in &ids {
            state.apply(*id, join("room1", "x"));
            // Repeated join does not grow the member set
            state.apply(*id, join("room1", "x"));
        }
        assert_eq!(state.status().membership_count, 4);

        for id in ids.iter().take(2) {
            state.apply(
                *id,
                Command::Part {
                    channel: "room1".to_string(),
                },
            );
            // Repeated part is a no-op
            state.apply(
                *id,
                Command::Part {
                    channel: "room1".to_string(),
                },
            );
        }
        let status = state.status();
        assert_eq!(status.membership_count, 2);
        assert_eq!(status.channel_count, 1);
        assert_eq!(status.connection_count, 4);
    }

    #[test]
    fn test_inverse_index_agrees_with_directory() {
        let mut state = state();
        let a = connect(&mut state);
        let b = connect(&mut state);

        state.apply(a, join("c1", "A"));
        state.apply(a, join("c2", "A"));
        state.apply(b, join("c2", "B"));

        for id in [a, b] {
            for key in state.joined_channels(&id) {
                assert!(state.channel_snapshot(&key).unwrap().contains_key(&id));
            }
        }
        assert_eq!(
            state.joined_channels(&a),
            vec![ChannelKey::from("c1"), ChannelKey::from("c2")]
        );
        assert_eq!(state.joined_channels(&b), vec![ChannelKey::from("c2")]);
    }

    #[test]
    fn test_origin_scoping_separates_channels() {
        let mut state = CoordinatorState::new(Arc::new(OriginScope::default()));
        let (outbox_a, _rx_a) = Outbox::channel(4);
        let (outbox_b, _rx_b) = Outbox::channel(4);
        let a = state.register(
            ConnectionContext {
                remote_addr: Some("10.0.0.1:1000".parse().unwrap()),
                forwarded_for: None,
            },
            outbox_a,
        );
        let b = state.register(
            ConnectionContext {
                remote_addr: Some("10.0.0.2:1000".parse().unwrap()),
                forwarded_for: None,
            },
            outbox_b,
        );

        assert!(state.apply(a, join("room1", "A")).is_empty());
        // Same room token, different origin: no addPeer in either direction
        assert!(state.apply(b, join("room1", "B")).is_empty());
        assert_eq!(state.status().channel_count, 2);
    }

    #[test]
    fn test_delivery_dispatch_reaches_outbox() {
        let (outbox, mut rx) = Outbox::channel(1);
        let peer_id = ConnectionId::new();
        let delivery = Delivery {
            recipient: ConnectionId::new(),
            outbox,
            event: ServerEvent::RemovePeer { peer_id },
        };

        assert_eq!(delivery.dispatch(), DeliveryOutcome::Delivered);
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::RemovePeer { peer_id });
    }
}
