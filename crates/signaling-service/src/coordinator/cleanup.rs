//! Disconnect cleanup.
//!
//! A vanished connection is parted from every channel in its joined set, in
//! the same way an explicit `part` would, and then removed from the registry.
//! Running it twice for the same id is a no-op.

use crate::types::{ChannelKey, ConnectionId};

use super::state::{CoordinatorState, Delivery};

use tracing::info;

impl CoordinatorState {
    /// Part `connection_id` from all its channels and unregister it.
    pub(super) fn disconnect(&mut self, connection_id: ConnectionId) -> Vec<Delivery> {
        // Copy the joined set first; part() mutates it
        let joined: Vec<ChannelKey> = match self.registry.lookup(&connection_id) {
            Some(entry) => entry.channels.iter().cloned().collect(),
            None => return Vec::new(),
        };

        let mut deliveries = Vec::new();
        for key in &joined {
            deliveries.extend(self.part(connection_id, key));
        }

        self.registry.unregister(&connection_id);

        info!(
            target: "signaling.coordinator",
            connection_id = %connection_id,
            channels = joined.len(),
            "Connection cleaned up"
        );

        deliveries
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use crate::coordinator::messages::{Command, ServerEvent};
    use crate::coordinator::registry::Outbox;
    use crate::coordinator::scope::RoomScope;
    use crate::coordinator::state::{CoordinatorState, Delivery};
    use crate::types::{ChannelKey, ConnectionContext, ConnectionId, UserData};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn connect(state: &mut CoordinatorState) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (outbox, rx) = Outbox::channel(32);
        (state.register(ConnectionContext::local(), outbox), rx)
    }

    fn dispatch(deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            delivery.dispatch();
        }
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
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
    fn test_disconnect_parts_every_joined_channel() {
        let mut state = CoordinatorState::new(Arc::new(RoomScope));
        let (a, _rx_a) = connect(&mut state);
        let (b, mut rx_b) = connect(&mut state);
        let (c, mut rx_c) = connect(&mut state);

        dispatch(state.apply(a, join("c1", "A")));
        dispatch(state.apply(a, join("c2", "A")));
        dispatch(state.apply(b, join("c1", "B")));
        dispatch(state.apply(c, join("c2", "C")));
        drain(&mut rx_b);
        drain(&mut rx_c);

        dispatch(state.apply(a, Command::Disconnect));

        assert_eq!(drain(&mut rx_b), vec![ServerEvent::RemovePeer { peer_id: a }]);
        assert_eq!(drain(&mut rx_c), vec![ServerEvent::RemovePeer { peer_id: a }]);
        assert!(!state.is_registered(&a));
        for key in ["c1", "c2"] {
            let snapshot = state.channel_snapshot(&ChannelKey::from(key)).unwrap();
            assert!(!snapshot.contains_key(&a));
        }
        assert_eq!(state.status().membership_count, 2);
    }

    #[test]
    fn test_disconnect_twice_is_noop() {
        let mut state = CoordinatorState::new(Arc::new(RoomScope));
        let (a, _rx_a) = connect(&mut state);
        dispatch(state.apply(a, join("c1", "A")));

        dispatch(state.apply(a, Command::Disconnect));
        assert!(state.apply(a, Command::Disconnect).is_empty());
        assert_eq!(state.status().connection_count, 0);
        assert_eq!(state.status().channel_count, 0);
    }

    #[test]
    fn test_two_peer_call_then_disconnect() {
        let mut state = CoordinatorState::new(Arc::new(RoomScope));
        let (x, mut rx_x) = connect(&mut state);
        let (y, mut rx_y) = connect(&mut state);

        dispatch(state.apply(x, join("room1", "Alice")));
        dispatch(state.apply(y, join("room1", "Bob")));

        match drain(&mut rx_x).as_slice() {
            [ServerEvent::AddPeer {
                peer_id,
                should_create_offer: false,
                channel,
            }] => {
                assert_eq!(*peer_id, y);
                assert_eq!(channel.get(&y).unwrap()["name"], "Bob");
            }
            other => panic!("unexpected events {other:?}"),
        }
        match drain(&mut rx_y).as_slice() {
            [ServerEvent::AddPeer {
                peer_id,
                should_create_offer: true,
                channel,
            }] => {
                assert_eq!(*peer_id, x);
                assert_eq!(channel.get(&x).unwrap()["name"], "Alice");
            }
            other => panic!("unexpected events {other:?}"),
        }

        dispatch(state.apply(
            x,
            Command::RelaySessionDescription {
                target: y,
                session_description: json!("OFFER"),
            },
        ));
        assert_eq!(
            drain(&mut rx_y),
            vec![ServerEvent::SessionDescription {
                peer_id: x,
                session_description: json!("OFFER"),
            }]
        );

        dispatch(state.apply(x, Command::Disconnect));
        assert_eq!(drain(&mut rx_y), vec![ServerEvent::RemovePeer { peer_id: x }]);
        let snapshot = state.channel_snapshot(&ChannelKey::from("room1")).unwrap();
        assert_eq!(snapshot.keys().copied().collect::<Vec<_>>(), vec![y]);
    }
}
