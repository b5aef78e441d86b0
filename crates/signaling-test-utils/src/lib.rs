//! # Signaling Test Utilities
//!
//! Shared test utilities for the signaling service.
//!
//! ## Modules
//!
//! - `peer` - In-process peer that records the events the coordinator sends it
//! - `client` - WebSocket client speaking the JSON wire protocol
//! - `server_harness` - Real signaling server on an ephemeral port
//! - `fixtures` - userData builders
//!
//! ## Usage
//!
//! ```rust,ignore
//! use signaling_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let coordinator = CoordinatorHandle::new("test".to_string(), Arc::new(RoomScope));
//!     let mut alice = TestPeer::connect(&coordinator).await;
//!     let mut bob = TestPeer::connect(&coordinator).await;
//!
//!     alice.join(&coordinator, "room1", user_data("Alice")).await;
//!     bob.join(&coordinator, "room1", user_data("Bob")).await;
//!
//!     let (offer, _) = bob.expect_add_peer(alice.id).await;
//!     assert!(offer);
//! }
//! ```

pub mod client;
pub mod fixtures;
pub mod peer;
pub mod server_harness;

pub use client::TestClient;
pub use fixtures::{user_data, user_data_with};
pub use peer::TestPeer;
pub use server_harness::TestSignalingServer;
