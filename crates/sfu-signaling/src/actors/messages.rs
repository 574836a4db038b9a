//! Message types for the session actor.
//!
//! Requests carry `oneshot` reply channels and are answered exactly once.
//! Engine calls never run inside the actor loop: multi-step operations are
//! split into a *prepare* message (pure lookup), an engine call awaited by
//! the issuing connection task, and a *commit* message (revalidate + mutate).
//! A hung engine call therefore stalls only the connection that issued it.

use crate::errors::SfuError;
use crate::store::StoreSnapshot;

use media_engine::{
    DtlsParameters, EngineError, IceCandidate, IceParameters, Producer, Router, RtpCapabilities,
    WebRtcTransport,
};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Messages handled by the session actor.
pub enum SessionMessage {
    /// Find a room by name or start creating one. All concurrent requests
    /// for the same unseen name receive the same room id.
    CreateOrJoinRoom {
        room_name: String,
        respond_to: oneshot::Sender<Result<String, SfuError>>,
    },

    /// Internal: router creation for a pending room finished.
    RoomCreateCompleted {
        room_name: String,
        result: Result<Arc<dyn Router>, EngineError>,
    },

    /// Fetch a room's codec capability set.
    GetRtpCapabilities {
        room_id: String,
        respond_to: oneshot::Sender<Result<RtpCapabilities, SfuError>>,
    },

    /// Prepare send-transport creation: resolve the room's router.
    PrepareSendTransport {
        room_id: String,
        respond_to: oneshot::Sender<Result<Arc<dyn Router>, SfuError>>,
    },

    /// Commit a created send transport: register the peer and the transport
    /// record, and arm the close watcher.
    CommitSendTransport {
        connection_id: String,
        room_id: String,
        transport: Arc<dyn WebRtcTransport>,
        respond_to: oneshot::Sender<Result<(), SfuError>>,
    },

    /// Resolve a peer's current send transport, if any.
    LookupSendTransport {
        peer_id: String,
        respond_to: oneshot::Sender<Option<Arc<dyn WebRtcTransport>>>,
    },

    /// Prepare producer creation: resolve peer, room, and send transport by
    /// connection id.
    PrepareProduce {
        connection_id: String,
        respond_to: oneshot::Sender<Result<ProducePrep, SfuError>>,
    },

    /// Commit a created producer: register it against its transport and room.
    CommitProduce {
        connection_id: String,
        room_id: String,
        transport_id: String,
        producer: Arc<dyn Producer>,
        respond_to: oneshot::Sender<Result<ProducerCreated, SfuError>>,
    },

    /// Internal: an engine transport closed (engine-side event).
    TransportClosed { transport_id: String },

    /// A peer left its room deliberately. Transports and producers are torn
    /// down; the peer record stays.
    ExitRoom { connection_id: String },

    /// A peer's connection dropped. Same as exit, plus the peer record is
    /// removed.
    Disconnect { connection_id: String },

    /// Fetch a snapshot of the session store.
    GetStatus {
        respond_to: oneshot::Sender<StoreSnapshot>,
    },
}

/// Resolution result for a `PrepareProduce` request.
pub struct ProducePrep {
    /// Resolved peer id (always the connection id).
    pub peer_id: String,
    /// Room the peer is in.
    pub room_id: String,
    /// Room name, for error messages.
    pub room_name: String,
    /// Id of the peer's current send transport.
    pub transport_id: String,
    /// Engine handle to call `produce` on.
    pub transport: Arc<dyn WebRtcTransport>,
}

/// Result of a completed send-transport creation.
#[derive(Debug, Clone)]
pub struct TransportCreated {
    /// Peer the transport belongs to.
    pub peer_id: String,
    /// Engine transport id.
    pub transport_id: String,
    /// Server-side ICE parameters.
    pub ice_parameters: IceParameters,
    /// Server-side ICE candidates.
    pub ice_candidates: Vec<IceCandidate>,
    /// Server-side DTLS parameters.
    pub dtls_parameters: DtlsParameters,
}

/// Result of a completed producer creation.
#[derive(Debug, Clone)]
pub struct ProducerCreated {
    /// Engine producer id.
    pub producer_id: String,
    /// Transport the producer runs over.
    pub transport_id: String,
}
