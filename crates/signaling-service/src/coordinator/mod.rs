//! Signaling coordinator.
//!
//! ```text
//! connection tasks ──Command──▶ CoordinatorHandle ──mailbox──▶ CoordinatorActor
//!                                                                 │
//!                                            CoordinatorState::apply (sync)
//!                                             ├── ConnectionRegistry
//!                                             └── ChannelDirectory
//!                                                                 │
//!                                                          Vec<Delivery>
//!                                                                 │
//! connection writers ◀──ServerEvent── Outbox (bounded, try_send) ◀┘
//! ```
//!
//! The registry maps connection ids to outboxes and joined channels; the
//! directory maps channel keys to member records. Both are owned by the actor
//! and only ever touched from its task, which makes every command atomic with
//! respect to every other.

mod actor;
mod cleanup;
mod directory;
mod membership;
mod messages;
mod metadata;
pub mod metrics;
mod registry;
mod relay;
mod scope;
mod state;

pub use actor::CoordinatorHandle;
pub use directory::{Channel, ChannelDirectory};
pub use messages::{Command, CoordinatorStatus, ServerEvent};
pub use metadata::PeerRecord;
pub use registry::{ConnectionEntry, ConnectionRegistry, DeliveryOutcome, Outbox};
pub use relay::NegotiationKind;
pub use scope::{ChannelScope, OriginScope, RoomScope, ScopeKind};
pub use state::{CoordinatorState, Delivery};
