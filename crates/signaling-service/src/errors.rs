//! Signaling service error types.
//!
//! None of these errors are ever sent to remote peers. Redundant joins and
//! parts, relays to unknown targets and metadata updates outside a membership
//! are absorbed as no-ops by the coordinator and never become errors at all.
//! What remains is infrastructure failure: the coordinator task being gone,
//! bad configuration, and transport-level problems at the WebSocket boundary.

use thiserror::Error;

/// Signaling service error type.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// The coordinator actor is no longer accepting messages (shut down or panicked).
    #[error("Coordinator unavailable: {0}")]
    CoordinatorUnavailable(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener or socket failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound frame that could not be decoded into a command.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignalingError {
    /// Whether the error is confined to a single inbound frame.
    ///
    /// Frame-local errors are logged and the connection keeps running; every
    /// other error ends the connection.
    #[must_use]
    pub fn is_frame_local(&self) -> bool {
        matches!(self, SignalingError::MalformedMessage(_))
    }
}

impl From<crate::config::ConfigError> for SignalingError {
    fn from(err: crate::config::ConfigError) -> Self {
        SignalingError::Config(err.to_string())
    }
}
