//! Pre-wired engine setups and payload helpers.

use crate::flaky::FlakyEngine;

use media_engine::{
    default_media_codecs, DtlsFingerprint, DtlsParameters, DtlsRole, LocalEngine, MediaEngine,
    RtpParameters, Worker, WorkerSettings,
};
use std::sync::Arc;

/// A `LocalEngine` plus a worker with default settings.
///
/// The engine is returned so tests can reach registered transports and
/// producers by id (e.g. to trigger close events).
pub async fn engine_with_worker() -> (Arc<LocalEngine>, Arc<dyn Worker>) {
    let engine = Arc::new(LocalEngine::new());
    let worker = engine
        .create_worker(WorkerSettings::default())
        .await
        .expect("worker creation should succeed");
    (engine, worker)
}

/// A `FlakyEngine` over a `LocalEngine`, plus a worker.
///
/// Returns the local engine (for registry access), the flaky wrapper (for
/// the fault switchboard), and the worker created through the wrapper.
pub async fn flaky_engine_with_worker() -> (Arc<LocalEngine>, FlakyEngine, Arc<dyn Worker>) {
    let local = Arc::new(LocalEngine::new());
    let flaky = FlakyEngine::new(Arc::clone(&local) as Arc<dyn MediaEngine>);
    let worker = flaky
        .create_worker(WorkerSettings::default())
        .await
        .expect("worker creation should succeed");
    (local, flaky, worker)
}

/// The codec set routers are created with in tests.
#[must_use]
pub fn test_codecs() -> Vec<media_engine::RtpCodecCapability> {
    default_media_codecs()
}

/// Minimal client DTLS parameters for connect calls.
#[must_use]
pub fn client_dtls_parameters() -> DtlsParameters {
    DtlsParameters {
        role: DtlsRole::Client,
        fingerprints: vec![DtlsFingerprint {
            algorithm: "sha-256".to_string(),
            value: "AA:BB:CC:DD".to_string(),
        }],
    }
}

/// Opaque RTP parameters of the shape clients send.
#[must_use]
pub fn client_rtp_parameters() -> RtpParameters {
    RtpParameters(serde_json::json!({
        "codecs": [],
        "encodings": [{ "ssrc": 1111 }]
    }))
}
