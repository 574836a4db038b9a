//! Media-forwarding engine adapter for the SFU signaling server.
//!
//! The signaling core never talks to a forwarding engine directly; it goes
//! through the traits in [`engine`]:
//!
//! ```text
//! MediaEngine (factory)
//! └── Worker (one forwarding process)
//!     └── Router (one per room, holds the codec capability set)
//!         └── WebRtcTransport (one per sending peer)
//!             └── Producer (one per outbound media flow)
//! ```
//!
//! [`local`] provides `LocalEngine`, an in-process implementation that honors
//! the interface semantics (id assignment, ICE/DTLS negotiation parameters,
//! close cascades) without forwarding any packets. The binary and the test
//! suite both run against it; a production deployment implements the same
//! traits over a real SFU engine.

#![warn(clippy::pedantic)]

pub mod engine;
pub mod local;
pub mod types;

pub use engine::{EngineError, MediaEngine, Producer, Router, WebRtcTransport, Worker};
pub use local::LocalEngine;
pub use types::{
    default_media_codecs, DtlsFingerprint, DtlsParameters, DtlsRole, DtlsState, IceCandidate,
    IceParameters, MediaKind, RtpCapabilities, RtpCodecCapability, RtpParameters,
    WebRtcTransportOptions, WorkerSettings,
};
