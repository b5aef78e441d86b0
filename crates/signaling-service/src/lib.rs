//! Signaling Service Library
//!
//! A WebRTC signaling coordinator. Browsers connect over WebSocket, join
//! named channels, and are introduced to each other so they can build a full
//! mesh of direct peer connections. The service never sees media; it only
//! tracks who is in which channel and forwards negotiation messages
//! (session descriptions and connectivity candidates) between peers.
//!
//! # Architecture
//!
//! ```text
//! WebSocket connection (one task per socket)
//! ├── reader: frames → Command → CoordinatorHandle
//! └── writer: Outbox → ServerEvent → frames
//!
//! CoordinatorActor (singleton)
//! └── CoordinatorState
//!     ├── ConnectionRegistry (id → outbox, joined channels)
//!     └── ChannelDirectory (channel → member records)
//! ```
//!
//! # Key Design Decisions
//!
//! - **One serialization point**: all membership changes run on the
//!   coordinator task, so every join/part/disconnect is atomic
//! - **Compute, then dispatch**: events are computed against committed state
//!   and pushed with non-blocking sends, so a stuck client never stalls others
//! - **Newcomer offers**: on join the newcomer is the designated offerer
//!   toward every existing member
//!
//! # Modules
//!
//! - [`coordinator`] - Registry, directory, state machine and actor
//! - [`transport`] - WebSocket endpoint and wire codec
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types
//! - [`observability`] - Health endpoints and Prometheus metrics

#![warn(clippy::pedantic)]

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod observability;
pub mod transport;
pub mod types;
