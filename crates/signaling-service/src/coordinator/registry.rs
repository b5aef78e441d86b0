//! Connection registry: live connections by id.
//!
//! Each entry carries the connection's outbox and the set of channel keys it
//! currently belongs to. That set is the inverse of the channel directory and
//! is what makes disconnect cleanup proportional to the joined-channel count.

use crate::types::{ChannelKey, ConnectionContext, ConnectionId};

use super::messages::ServerEvent;

use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Result of handing an event to an outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Queued for the connection's writer.
    Delivered,
    /// The outbox is at capacity; the event was dropped.
    Full,
    /// The connection's writer is gone; the event was dropped.
    Closed,
}

/// Sending half of a connection's bounded outbound event queue.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::Sender<ServerEvent>,
}

impl Outbox {
    /// Create an outbox and the receiver its writer task drains.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Queue an event without waiting.
    pub fn try_deliver(&self, event: ServerEvent) -> DeliveryOutcome {
        match self.sender.try_send(event) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(TrySendError::Full(_)) => DeliveryOutcome::Full,
            Err(TrySendError::Closed(_)) => DeliveryOutcome::Closed,
        }
    }
}

/// A registered connection.
#[derive(Debug)]
pub struct ConnectionEntry {
    /// Where events for this connection are queued.
    pub outbox: Outbox,
    /// Transport facts used for channel scoping.
    pub context: ConnectionContext,
    /// Channels this connection is a member of.
    pub channels: HashSet<ChannelKey>,
}

/// Live connections by id.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection and return its freshly allocated id.
    pub fn register(&mut self, context: ConnectionContext, outbox: Outbox) -> ConnectionId {
        let mut id = ConnectionId::new();
        while self.connections.contains_key(&id) {
            id = ConnectionId::new();
        }

        self.connections.insert(
            id,
            ConnectionEntry {
                outbox,
                context,
                channels: HashSet::new(),
            },
        );
        id
    }

    /// Remove a connection, returning its entry if it was registered.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<ConnectionEntry> {
        self.connections.remove(id)
    }

    #[must_use]
    pub fn lookup(&self, id: &ConnectionId) -> Option<&ConnectionEntry> {
        self.connections.get(id)
    }

    pub fn lookup_mut(&mut self, id: &ConnectionId) -> Option<&mut ConnectionEntry> {
        self.connections.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Ids of every registered connection.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_register_lookup_unregister() {
        let mut registry = ConnectionRegistry::new();
        let (outbox, _rx) = Outbox::channel(4);

        let id = registry.register(ConnectionContext::local(), outbox);
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(&id).unwrap().channels.is_empty());

        assert!(registry.unregister(&id).is_some());
        assert!(registry.lookup(&id).is_none());
        assert!(registry.is_empty());

        // Second unregister is a no-op
        assert!(registry.unregister(&id).is_none());
    }

    #[test]
    fn test_register_allocates_distinct_ids() {
        let mut registry = ConnectionRegistry::new();
        let (a, _rx_a) = Outbox::channel(1);
        let (b, _rx_b) = Outbox::channel(1);

        let id_a = registry.register(ConnectionContext::local(), a);
        let id_b = registry.register(ConnectionContext::local(), b);
        assert_ne!(id_a, id_b);
        assert_eq!(registry.ids().len(), 2);
    }

    #[test]
    fn test_outbox_outcomes() {
        let peer_id = ConnectionId::new();
        let event = ServerEvent::RemovePeer { peer_id };

        let (outbox, mut rx) = Outbox::channel(1);
        assert_eq!(outbox.try_deliver(event.clone()), DeliveryOutcome::Delivered);
        assert_eq!(outbox.try_deliver(event.clone()), DeliveryOutcome::Full);
        assert_eq!(rx.try_recv().unwrap(), event);

        drop(rx);
        assert_eq!(outbox.try_deliver(event), DeliveryOutcome::Closed);
    }
}
