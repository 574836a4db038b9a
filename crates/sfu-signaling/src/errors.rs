//! Signaling server error types.
//!
//! Not-found and engine-failure errors surface to clients as structured
//! `{error: message}` reply data. Internal details are logged server-side
//! but not exposed to clients.

use media_engine::EngineError;
use thiserror::Error;

/// Signaling server error type.
#[derive(Debug, Error)]
pub enum SfuError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Room creation was rejected by the media engine.
    #[error("Room creation failed: {0}")]
    RoomCreation(String),

    /// Room not found for a client-supplied room id.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Peer not found for a connection id.
    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    /// A peer's room back-reference points at nothing.
    #[error("Room not found for peer: {0}")]
    PeerRoomNotFound(String),

    /// The engine rejected transport creation for a room.
    #[error("Transport creation failed for room {0}")]
    TransportCreation(String),

    /// A peer has no registered send transport in its room.
    #[error("Send transport not found for peer {peer_id} in {room_name}")]
    TransportNotFound {
        /// Peer whose transport was looked up.
        peer_id: String,
        /// Name of the room the lookup ran in.
        room_name: String,
    },

    /// The engine rejected producer creation on a peer's transport.
    #[error("Produce failed for peer {peer_id} in {room_name}")]
    ProduceFailed {
        /// Peer that attempted to produce.
        peer_id: String,
        /// Name of the room the peer is in.
        room_name: String,
    },

    /// Internal error (channel failures, engine internals).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SfuError {
    /// Returns a client-safe error message for the `{error: message}` reply.
    ///
    /// The wording for the not-found and produce paths is load-bearing:
    /// deployed clients display these strings verbatim.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            SfuError::Config(_) | SfuError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            SfuError::RoomCreation(_) => "The room could not be created on the server".to_string(),
            SfuError::RoomNotFound(_) => "There is no room with the specified id".to_string(),
            SfuError::PeerNotFound(peer_id) => {
                format!("No peer was found with this id, peerID: {peer_id}")
            }
            SfuError::PeerRoomNotFound(peer_id) => {
                format!("No room was found for the peer, peerID: {peer_id}")
            }
            SfuError::TransportCreation(_) => {
                "The router could not create the WebRTC transport".to_string()
            }
            SfuError::TransportNotFound { peer_id, room_name } => {
                format!("The producer transport for peer {peer_id} could not be found in {room_name}")
            }
            SfuError::ProduceFailed { peer_id, room_name } => {
                format!("The producer transport for peer {peer_id} in {room_name} could not produce media")
            }
        }
    }
}

impl From<EngineError> for SfuError {
    fn from(err: EngineError) -> Self {
        SfuError::Internal(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_hide_internal_details() {
        let config_err = SfuError::Config("missing SFU_ANNOUNCED_IP at 10.0.0.3".to_string());
        assert!(!config_err.client_message().contains("10.0.0.3"));
        assert_eq!(config_err.client_message(), "An internal error occurred");

        let internal_err = SfuError::Internal("channel send failed: closed".to_string());
        assert!(!internal_err.client_message().contains("channel"));
    }

    #[test]
    fn test_not_found_messages_name_the_entity() {
        let err = SfuError::PeerNotFound("conn-1".to_string());
        assert_eq!(
            err.client_message(),
            "No peer was found with this id, peerID: conn-1"
        );

        let err = SfuError::TransportNotFound {
            peer_id: "conn-1".to_string(),
            room_name: "standup".to_string(),
        };
        assert_eq!(
            err.client_message(),
            "The producer transport for peer conn-1 could not be found in standup"
        );
    }

    #[test]
    fn test_room_not_found_message() {
        let err = SfuError::RoomNotFound("room-9".to_string());
        assert_eq!(err.client_message(), "There is no room with the specified id");
    }

    #[test]
    fn test_engine_error_conversion() {
        let err: SfuError = EngineError::WorkerDied.into();
        assert!(matches!(err, SfuError::Internal(_)));
        assert_eq!(err.client_message(), "An internal error occurred");
    }
}
