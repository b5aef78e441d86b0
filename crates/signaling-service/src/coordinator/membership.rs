//! Join and part semantics over the channel directory.
//!
//! # Negotiation roles
//!
//! When a connection joins, every existing member is told about the newcomer
//! with `should_create_offer = false`, and the newcomer is told about every
//! existing member with `should_create_offer = true`. The relay does no
//! arbitration, so this fixed asymmetry is what guarantees exactly one offerer
//! per pair of peers.

use crate::types::{ChannelKey, ConnectionId, UserData};

use super::messages::ServerEvent;
use super::metadata::PeerRecord;
use super::state::{CoordinatorState, Delivery};

use tracing::{debug, info, warn};

impl CoordinatorState {
    /// Add `connection_id` to `key`.
    ///
    /// Idempotent: joining a channel the connection already belongs to emits
    /// nothing and leaves its existing metadata in place.
    pub(super) fn join(
        &mut self,
        connection_id: ConnectionId,
        key: &ChannelKey,
        user_data: UserData,
    ) -> Vec<Delivery> {
        let Some(entry) = self.registry.lookup(&connection_id) else {
            return Vec::new();
        };
        if entry.channels.contains(key) {
            debug!(
                target: "signaling.coordinator",
                connection_id = %connection_id,
                channel = %key,
                "Already a member, join ignored"
            );
            return Vec::new();
        }
        let newcomer_outbox = entry.outbox.clone();

        let Some(channel) = self
            .directory
            .insert_member(key, PeerRecord::new(connection_id, user_data))
        else {
            warn!(
                target: "signaling.coordinator",
                connection_id = %connection_id,
                channel = %key,
                "Directory already lists connection missing from its joined set"
            );
            return Vec::new();
        };

        let snapshot = channel.snapshot();
        let existing: Vec<ConnectionId> = channel
            .member_ids()
            .filter(|id| *id != connection_id)
            .collect();

        if let Some(entry) = self.registry.lookup_mut(&connection_id) {
            entry.channels.insert(key.clone());
        }

        let mut deliveries = Vec::with_capacity(existing.len() * 2);
        for member in existing {
            if let Some(member_entry) = self.registry.lookup(&member) {
                deliveries.push(Delivery {
                    recipient: member,
                    outbox: member_entry.outbox.clone(),
                    event: ServerEvent::AddPeer {
                        peer_id: connection_id,
                        should_create_offer: false,
                        channel: snapshot.clone(),
                    },
                });
            }
            deliveries.push(Delivery {
                recipient: connection_id,
                outbox: newcomer_outbox.clone(),
                event: ServerEvent::AddPeer {
                    peer_id: member,
                    should_create_offer: true,
                    channel: snapshot.clone(),
                },
            });
        }

        info!(
            target: "signaling.coordinator",
            connection_id = %connection_id,
            channel = %key,
            members = snapshot.len(),
            "Joined channel"
        );

        deliveries
    }

    /// Remove `connection_id` from `key`.
    ///
    /// A no-op when the connection is not a member. Remaining members are told
    /// the connection left, and the departing connection is told about each
    /// remaining member on a best-effort basis.
    pub(super) fn part(&mut self, connection_id: ConnectionId, key: &ChannelKey) -> Vec<Delivery> {
        let Some(entry) = self.registry.lookup_mut(&connection_id) else {
            return Vec::new();
        };
        if !entry.channels.remove(key) {
            debug!(
                target: "signaling.coordinator",
                connection_id = %connection_id,
                channel = %key,
                "Not a member, part ignored"
            );
            return Vec::new();
        }
        let departing_outbox = entry.outbox.clone();

        let remaining = self
            .directory
            .remove_member(key, &connection_id)
            .unwrap_or_default();

        let mut deliveries = Vec::with_capacity(remaining.len() * 2);
        for member in &remaining {
            if let Some(member_entry) = self.registry.lookup(member) {
                deliveries.push(Delivery {
                    recipient: *member,
                    outbox: member_entry.outbox.clone(),
                    event: ServerEvent::RemovePeer {
                        peer_id: connection_id,
                    },
                });
            }
            deliveries.push(Delivery {
                recipient: connection_id,
                outbox: departing_outbox.clone(),
                event: ServerEvent::RemovePeer { peer_id: *member },
            });
        }

        info!(
            target: "signaling.coordinator",
            connection_id = %connection_id,
            channel = %key,
            remaining = remaining.len(),
            "Parted channel"
        );

        deliveries
    }
}
