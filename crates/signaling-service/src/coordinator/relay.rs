//! Point-to-point forwarding of negotiation payloads.
//!
//! Candidates and session descriptions are opaque to the coordinator. The
//! only check is that the target is a registered connection; anything else
//! is dropped without telling the sender.

use crate::observability::metrics;
use crate::types::ConnectionId;

use super::messages::ServerEvent;
use super::state::{CoordinatorState, Delivery};

use tracing::debug;

/// Which negotiation payload is being relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationKind {
    Candidate,
    SessionDescription,
}

impl NegotiationKind {
    /// Event delivered to the target, attributed to `source`.
    #[must_use]
    pub fn into_event(self, source: ConnectionId, payload: serde_json::Value) -> ServerEvent {
        match self {
            NegotiationKind::Candidate => ServerEvent::IceCandidate {
                peer_id: source,
                ice_candidate: payload,
            },
            NegotiationKind::SessionDescription => ServerEvent::SessionDescription {
                peer_id: source,
                session_description: payload,
            },
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            NegotiationKind::Candidate => "ice_candidate",
            NegotiationKind::SessionDescription => "session_description",
        }
    }
}

impl CoordinatorState {
    /// Forward `payload` from `source` to `target` unchanged.
    ///
    /// Produces exactly one delivery when `target` is registered, none otherwise.
    pub(super) fn relay(
        &self,
        source: ConnectionId,
        kind: NegotiationKind,
        target: ConnectionId,
        payload: serde_json::Value,
    ) -> Vec<Delivery> {
        let Some(entry) = self.registry.lookup(&target) else {
            debug!(
                target: "signaling.coordinator",
                source = %source,
                peer_id = %target,
                kind = kind.as_str(),
                "Relay target unknown, dropped"
            );
            metrics::record_relay_dropped();
            return Vec::new();
        };

        vec![Delivery {
            recipient: target,
            outbox: entry.outbox.clone(),
            event: kind.into_event(source, payload),
        }]
    }
}
