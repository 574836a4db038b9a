//! Engine adapter traits.
//!
//! The signaling core holds engine resources exclusively through these trait
//! objects, so the whole core can run against any engine implementation.
//! Close notifications surface as [`CancellationToken`]s rather than
//! registered callbacks: a watcher task awaits the token and feeds the event
//! back into the session actor's mailbox.

use crate::types::{
    DtlsParameters, IceCandidate, IceParameters, MediaKind, RtpCapabilities, RtpCodecCapability,
    RtpParameters, WebRtcTransportOptions, WorkerSettings,
};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors surfaced by an engine implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The worker process backing this resource has died.
    #[error("worker is dead")]
    WorkerDied,

    /// The transport was closed before or during the operation.
    #[error("transport is closed")]
    TransportClosed,

    /// Any other engine-side failure.
    #[error("engine failure: {0}")]
    Internal(String),
}

/// Entry point to a media-forwarding engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Create a forwarding worker process.
    async fn create_worker(&self, settings: WorkerSettings) -> Result<Arc<dyn Worker>, EngineError>;
}

/// A forwarding worker process.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Process id of the worker, for logging.
    fn pid(&self) -> u32;

    /// Create a router with the given codec capability set.
    ///
    /// One router is created per room; its id doubles as the room id.
    async fn create_router(
        &self,
        codecs: Vec<RtpCodecCapability>,
    ) -> Result<Arc<dyn Router>, EngineError>;

    /// Token cancelled when the worker process dies.
    ///
    /// Worker death is unrecoverable; the process watching this token is
    /// expected to terminate after a short flush delay.
    fn died(&self) -> CancellationToken;
}

/// A per-room media routing context.
#[async_trait]
pub trait Router: Send + Sync {
    /// Engine-assigned router id.
    fn id(&self) -> &str;

    /// The codec capability set advertised to clients.
    fn rtp_capabilities(&self) -> RtpCapabilities;

    /// Create a WebRTC transport bound to this router.
    async fn create_webrtc_transport(
        &self,
        options: WebRtcTransportOptions,
    ) -> Result<Arc<dyn WebRtcTransport>, EngineError>;
}

/// A secured media-carrying connection between one peer and the engine.
#[async_trait]
pub trait WebRtcTransport: Send + Sync {
    /// Engine-assigned transport id.
    fn id(&self) -> &str;

    /// Server-side ICE parameters for client negotiation.
    fn ice_parameters(&self) -> IceParameters;

    /// Server-side ICE candidates for client negotiation.
    fn ice_candidates(&self) -> Vec<IceCandidate>;

    /// Server-side DTLS parameters for client negotiation.
    fn dtls_parameters(&self) -> DtlsParameters;

    /// Complete the DTLS handshake with client-negotiated parameters.
    async fn connect(&self, dtls_parameters: DtlsParameters) -> Result<(), EngineError>;

    /// Create a producer moving media of `kind` over this transport.
    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<Arc<dyn Producer>, EngineError>;

    /// Close the transport and release engine resources. Idempotent.
    fn close(&self);

    /// Token cancelled once when the transport closes, whether via
    /// [`close`](WebRtcTransport::close) or the engine's own DTLS-closed
    /// handling.
    fn closed(&self) -> CancellationToken;
}

/// An active outbound media flow from a peer's transport.
pub trait Producer: Send + Sync {
    /// Engine-assigned producer id.
    fn id(&self) -> &str;

    /// Media kind of this flow.
    fn kind(&self) -> MediaKind;

    /// Stop the flow and release engine resources. Idempotent.
    fn close(&self);

    /// Whether the producer has been closed.
    fn is_closed(&self) -> bool;
}
