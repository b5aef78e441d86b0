//! JSON wire codec.
//!
//! Frames are `{"event": <name>, "data": {...}}`. Decoding turns a frame
//! into a [`Command`]; anything that does not decode is a
//! [`SignalingError::MalformedMessage`] and only affects that one frame.

use crate::coordinator::{Command, ServerEvent};
use crate::errors::SignalingError;
use crate::types::{ConnectionId, UserData};

use serde::Deserialize;

/// A frame sent by a browser client.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
enum ClientMessage {
    #[serde(rename = "join")]
    Join {
        channel: String,
        // Absent and null both mean no metadata
        #[serde(rename = "userData", default)]
        user_data: Option<UserData>,
    },

    #[serde(rename = "part")]
    Part { channel: String },

    #[serde(rename = "updateUserData")]
    UpdateUserData {
        channel: String,
        key: String,
        value: serde_json::Value,
    },

    #[serde(rename = "relayICECandidate")]
    RelayIceCandidate {
        peer_id: ConnectionId,
        ice_candidate: serde_json::Value,
    },

    #[serde(rename = "relaySessionDescription")]
    RelaySessionDescription {
        peer_id: ConnectionId,
        session_description: serde_json::Value,
    },
}

impl From<ClientMessage> for Command {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::Join { channel, user_data } => Command::Join {
                channel,
                user_data: user_data.unwrap_or_default(),
            },
            ClientMessage::Part { channel } => Command::Part { channel },
            ClientMessage::UpdateUserData {
                channel,
                key,
                value,
            } => Command::UpdateUserData {
                channel,
                key,
                value,
            },
            ClientMessage::RelayIceCandidate {
                peer_id,
                ice_candidate,
            } => Command::RelayCandidate {
                target: peer_id,
                candidate: ice_candidate,
            },
            ClientMessage::RelaySessionDescription {
                peer_id,
                session_description,
            } => Command::RelaySessionDescription {
                target: peer_id,
                session_description,
            },
        }
    }
}

/// Decode one text frame into a command.
///
/// # Errors
///
/// Returns `MalformedMessage` for invalid JSON, unknown events, missing
/// fields or ill-typed values.
pub fn decode(text: &str) -> Result<Command, SignalingError> {
    serde_json::from_str::<ClientMessage>(text)
        .map(Command::from)
        .map_err(|e| SignalingError::MalformedMessage(e.to_string()))
}

/// Encode an event as a text frame.
///
/// # Errors
///
/// Returns `Internal` if serialization fails, which only happens for
/// non-string map keys inside relayed payloads.
pub fn encode(event: &ServerEvent) -> Result<String, SignalingError> {
    serde_json::to_string(event)
        .map_err(|e| SignalingError::Internal(format!("event encode failed: {e}")))
}
