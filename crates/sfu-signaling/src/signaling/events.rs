//! Wire frames for the WebSocket signaling protocol.
//!
//! Inbound frames are `{"event": <name>, "data": {...}, "ack": <n>}`; a
//! frame carrying an `ack` gets exactly one reply `{"ack": <n>, "data":
//! <value>}`, where an error reply's data is `{"error": <message>}`. Frames
//! without an `ack` get no reply.
//!
//! Event and field names are the protocol as deployed clients speak it
//! (`createOrJoinRoom`, `roomID`, `dtlsParameters`, ...); none of them
//! follow Rust naming, hence the renames.

use media_engine::{DtlsParameters, IceCandidate, IceParameters, MediaKind, RtpParameters};
use serde::{Deserialize, Serialize};

/// An inbound signaling frame.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    /// The event and its payload.
    #[serde(flatten)]
    pub event: ClientEvent,
    /// Reply correlation id; absent means fire-and-forget.
    pub ack: Option<u64>,
}

/// The signaling events clients may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Find or create a room by name.
    #[serde(rename = "createOrJoinRoom")]
    CreateOrJoinRoom {
        #[serde(rename = "roomName")]
        room_name: String,
    },

    /// Fetch a room's codec capability set.
    #[serde(rename = "getRTPCapabilities")]
    GetRtpCapabilities {
        #[serde(rename = "roomID")]
        room_id: String,
    },

    /// Create a send transport in a room.
    #[serde(rename = "createSendRtcTransport")]
    CreateSendRtcTransport {
        #[serde(rename = "roomID")]
        room_id: String,
    },

    /// Forward client DTLS parameters to the peer's send transport.
    #[serde(rename = "connectSendTransport")]
    ConnectSendTransport {
        #[serde(rename = "dtlsParameters")]
        dtls_parameters: DtlsParameters,
        #[serde(rename = "peerID")]
        peer_id: String,
    },

    /// Create a producer on the peer's send transport.
    ///
    /// `peerID` and `roomID` are carried for protocol compatibility but the
    /// server resolves the peer from the connection, not from them.
    #[serde(rename = "produceMedia")]
    ProduceMedia {
        kind: MediaKind,
        #[serde(rename = "rtpParameters")]
        rtp_parameters: RtpParameters,
        #[serde(rename = "peerID")]
        peer_id: Option<String>,
        #[serde(rename = "roomID")]
        room_id: Option<String>,
    },

    /// Leave the current room, keeping the connection open.
    #[serde(rename = "exitRoom")]
    ExitRoom {},
}

/// An outbound reply frame.
#[derive(Debug, Serialize)]
pub struct ReplyFrame {
    /// Correlation id copied from the request.
    pub ack: u64,
    /// Reply payload; `{"error": <message>}` on failure.
    pub data: serde_json::Value,
}

impl ReplyFrame {
    /// Build an error reply.
    #[must_use]
    pub fn error(ack: u64, message: String) -> Self {
        Self {
            ack,
            data: serde_json::json!({ "error": message }),
        }
    }
}

/// Reply data for `createSendRtcTransport`.
#[derive(Debug, Serialize)]
pub struct TransportCreatedReply {
    /// Negotiation parameters for the client's transport counterpart.
    pub params: TransportParams,
    /// Server-assigned peer id (the connection id).
    #[serde(rename = "peerID")]
    pub peer_id: String,
}

/// Transport negotiation parameters inside [`TransportCreatedReply`].
#[derive(Debug, Serialize)]
pub struct TransportParams {
    /// Engine transport id.
    pub id: String,
    #[serde(rename = "iceParameters")]
    pub ice_parameters: IceParameters,
    #[serde(rename = "iceCandidates")]
    pub ice_candidates: Vec<IceCandidate>,
    #[serde(rename = "dtlsParameters")]
    pub dtls_parameters: DtlsParameters,
}

/// Reply data for `produceMedia`.
#[derive(Debug, Serialize)]
pub struct ProducerCreatedReply {
    #[serde(rename = "producerID")]
    pub producer_id: String,
    #[serde(rename = "transportID")]
    pub transport_id: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_or_join_room() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"event": "createOrJoinRoom", "data": {"roomName": "standup"}, "ack": 1}"#,
        )
        .unwrap();

        assert_eq!(frame.ack, Some(1));
        assert!(
            matches!(frame.event, ClientEvent::CreateOrJoinRoom { room_name } if room_name == "standup")
        );
    }

    #[test]
    fn test_parse_get_rtp_capabilities_event_name() {
        // The deployed event name has RTP fully uppercased
        let frame: ClientFrame = serde_json::from_str(
            r#"{"event": "getRTPCapabilities", "data": {"roomID": "room-1"}, "ack": 2}"#,
        )
        .unwrap();

        assert!(matches!(
            frame.event,
            ClientEvent::GetRtpCapabilities { room_id } if room_id == "room-1"
        ));
    }

    #[test]
    fn test_parse_connect_send_transport() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{
                "event": "connectSendTransport",
                "data": {
                    "dtlsParameters": {
                        "role": "client",
                        "fingerprints": [{"algorithm": "sha-256", "value": "AB:CD"}]
                    },
                    "peerID": "conn-7"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(frame.ack, None);
        let ClientEvent::ConnectSendTransport {
            dtls_parameters,
            peer_id,
        } = frame.event
        else {
            panic!("wrong event variant");
        };
        assert_eq!(peer_id, "conn-7");
        assert_eq!(dtls_parameters.fingerprints.len(), 1);
    }

    #[test]
    fn test_parse_produce_media() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{
                "event": "produceMedia",
                "data": {
                    "kind": "video",
                    "rtpParameters": {"codecs": []},
                    "peerID": "conn-7",
                    "roomID": "room-1"
                },
                "ack": 5
            }"#,
        )
        .unwrap();

        let ClientEvent::ProduceMedia { kind, peer_id, .. } = frame.event else {
            panic!("wrong event variant");
        };
        assert_eq!(kind, MediaKind::Video);
        assert_eq!(peer_id.as_deref(), Some("conn-7"));
    }

    #[test]
    fn test_parse_exit_room() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"event": "exitRoom", "data": {}}"#).unwrap();
        assert!(matches!(frame.event, ClientEvent::ExitRoom {}));
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let result: Result<ClientFrame, _> =
            serde_json::from_str(r#"{"event": "subscribeMedia", "data": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_reply_shape() {
        let reply = ReplyFrame::error(9, "There is no room with the specified id".to_string());
        let json = serde_json::to_value(&reply).unwrap();

        assert_eq!(json.get("ack").unwrap(), 9);
        assert_eq!(
            json.get("data").unwrap().get("error").unwrap(),
            "There is no room with the specified id"
        );
    }

    #[test]
    fn test_transport_reply_wire_names() {
        let reply = TransportCreatedReply {
            params: TransportParams {
                id: "t-1".to_string(),
                ice_parameters: IceParameters {
                    username_fragment: "ufrag".to_string(),
                    password: "pass".to_string(),
                    ice_lite: true,
                },
                ice_candidates: vec![],
                dtls_parameters: DtlsParameters {
                    role: media_engine::DtlsRole::Auto,
                    fingerprints: vec![],
                },
            },
            peer_id: "conn-7".to_string(),
        };

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json.get("peerID").unwrap(), "conn-7");
        let params = json.get("params").unwrap();
        assert!(params.get("iceParameters").is_some());
        assert!(params.get("iceCandidates").is_some());
        assert!(params.get("dtlsParameters").is_some());
        assert_eq!(
            params
                .get("iceParameters")
                .unwrap()
                .get("usernameFragment")
                .unwrap(),
            "ufrag"
        );
    }

    #[test]
    fn test_producer_reply_wire_names() {
        let reply = ProducerCreatedReply {
            producer_id: "p-1".to_string(),
            transport_id: "t-1".to_string(),
        };

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json.get("producerID").unwrap(), "p-1");
        assert_eq!(json.get("transportID").unwrap(), "t-1");
    }
}
