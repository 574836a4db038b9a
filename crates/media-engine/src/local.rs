//! In-process engine implementation.
//!
//! `LocalEngine` assigns real ids, fabricates ICE/DTLS negotiation
//! parameters, and honors the close semantics of the adapter traits, but
//! forwards no media. It backs the binary in development and the whole test
//! suite; the engine keeps a registry of live transports and producers so
//! tests can reach into resources owned by the session store.

use crate::engine::{EngineError, MediaEngine, Producer, Router, WebRtcTransport, Worker};
use crate::types::{
    DtlsFingerprint, DtlsParameters, DtlsRole, DtlsState, IceCandidate, IceParameters, MediaKind,
    RtpCapabilities, RtpCodecCapability, RtpParameters, WebRtcTransportOptions, WorkerSettings,
};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// ICE candidate priority for the preferred protocol.
const PREFERRED_CANDIDATE_PRIORITY: u32 = 1_076_302_079;

/// ICE candidate priority for the fallback protocol.
const FALLBACK_CANDIDATE_PRIORITY: u32 = 1_015_021_823;

/// Lock a mutex, recovering the guard if a test thread panicked while
/// holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of live engine resources, shared across workers and routers.
#[derive(Default)]
struct EngineShared {
    transports: Mutex<HashMap<String, Arc<LocalWebRtcTransport>>>,
    producers: Mutex<HashMap<String, Arc<LocalProducer>>>,
}

/// In-process media engine.
#[derive(Default)]
pub struct LocalEngine {
    shared: Arc<EngineShared>,
}

impl LocalEngine {
    /// Create a new in-process engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live transport by id.
    #[must_use]
    pub fn transport(&self, id: &str) -> Option<Arc<LocalWebRtcTransport>> {
        lock(&self.shared.transports).get(id).cloned()
    }

    /// Look up a live producer by id.
    #[must_use]
    pub fn producer(&self, id: &str) -> Option<Arc<LocalProducer>> {
        lock(&self.shared.producers).get(id).cloned()
    }
}

#[async_trait]
impl MediaEngine for LocalEngine {
    async fn create_worker(
        &self,
        settings: WorkerSettings,
    ) -> Result<Arc<dyn Worker>, EngineError> {
        let worker = LocalWorker {
            ports: Arc::new(PortRange::new(settings.rtc_min_port, settings.rtc_max_port)),
            settings,
            died: CancellationToken::new(),
            shared: Arc::clone(&self.shared),
        };

        debug!(
            target: "engine.local",
            pid = worker.pid(),
            rtc_min_port = worker.settings.rtc_min_port,
            rtc_max_port = worker.settings.rtc_max_port,
            "Worker created"
        );

        Ok(Arc::new(worker))
    }
}

/// RTC port allocator for one worker.
struct PortRange {
    min: u16,
    max: u16,
    next: AtomicU16,
}

impl PortRange {
    fn new(min: u16, max: u16) -> Self {
        Self {
            min,
            max: max.max(min),
            next: AtomicU16::new(0),
        }
    }

    fn allocate(&self) -> u16 {
        let span = self.max - self.min + 1;
        let offset = self.next.fetch_add(1, Ordering::Relaxed) % span;
        self.min + offset
    }
}

/// In-process worker.
pub struct LocalWorker {
    settings: WorkerSettings,
    died: CancellationToken,
    ports: Arc<PortRange>,
    shared: Arc<EngineShared>,
}

#[async_trait]
impl Worker for LocalWorker {
    fn pid(&self) -> u32 {
        std::process::id()
    }

    async fn create_router(
        &self,
        codecs: Vec<RtpCodecCapability>,
    ) -> Result<Arc<dyn Router>, EngineError> {
        if self.died.is_cancelled() {
            return Err(EngineError::WorkerDied);
        }

        let router = LocalRouter {
            id: uuid::Uuid::new_v4().to_string(),
            codecs,
            died: self.died.clone(),
            ports: Arc::clone(&self.ports),
            shared: Arc::clone(&self.shared),
        };

        debug!(target: "engine.local", router_id = %router.id, "Router created");
        Ok(Arc::new(router))
    }

    fn died(&self) -> CancellationToken {
        self.died.clone()
    }
}

/// In-process router.
pub struct LocalRouter {
    id: String,
    codecs: Vec<RtpCodecCapability>,
    died: CancellationToken,
    ports: Arc<PortRange>,
    shared: Arc<EngineShared>,
}

#[async_trait]
impl Router for LocalRouter {
    fn id(&self) -> &str {
        &self.id
    }

    fn rtp_capabilities(&self) -> RtpCapabilities {
        RtpCapabilities {
            codecs: self.codecs.clone(),
        }
    }

    async fn create_webrtc_transport(
        &self,
        options: WebRtcTransportOptions,
    ) -> Result<Arc<dyn WebRtcTransport>, EngineError> {
        if self.died.is_cancelled() {
            return Err(EngineError::WorkerDied);
        }

        let mut candidates = Vec::new();
        if options.enable_udp {
            candidates.push(IceCandidate {
                foundation: "udpcandidate".to_string(),
                priority: if options.prefer_udp {
                    PREFERRED_CANDIDATE_PRIORITY
                } else {
                    FALLBACK_CANDIDATE_PRIORITY
                },
                ip: options.announced_ip.clone(),
                protocol: "udp".to_string(),
                port: self.ports.allocate(),
                candidate_type: "host".to_string(),
                tcp_type: None,
            });
        }
        if options.enable_tcp {
            candidates.push(IceCandidate {
                foundation: "tcpcandidate".to_string(),
                priority: if options.prefer_udp {
                    FALLBACK_CANDIDATE_PRIORITY
                } else {
                    PREFERRED_CANDIDATE_PRIORITY
                },
                ip: options.announced_ip.clone(),
                protocol: "tcp".to_string(),
                port: self.ports.allocate(),
                candidate_type: "host".to_string(),
                tcp_type: Some("passive".to_string()),
            });
        }

        let transport = Arc::new(LocalWebRtcTransport {
            id: uuid::Uuid::new_v4().to_string(),
            ice_parameters: IceParameters {
                username_fragment: random_token(8),
                password: random_token(24),
                ice_lite: true,
            },
            ice_candidates: candidates,
            dtls_parameters: DtlsParameters {
                role: DtlsRole::Auto,
                fingerprints: vec![DtlsFingerprint {
                    algorithm: "sha-256".to_string(),
                    value: random_fingerprint(),
                }],
            },
            state: Mutex::new(TransportState {
                dtls_state: DtlsState::New,
                remote_dtls: None,
            }),
            close_token: CancellationToken::new(),
            shared: Arc::clone(&self.shared),
        });

        lock(&self.shared.transports).insert(transport.id.clone(), Arc::clone(&transport));

        debug!(
            target: "engine.local",
            router_id = %self.id,
            transport_id = %transport.id,
            "WebRTC transport created"
        );

        Ok(transport)
    }
}

struct TransportState {
    dtls_state: DtlsState,
    remote_dtls: Option<DtlsParameters>,
}

/// In-process WebRTC transport.
pub struct LocalWebRtcTransport {
    id: String,
    ice_parameters: IceParameters,
    ice_candidates: Vec<IceCandidate>,
    dtls_parameters: DtlsParameters,
    state: Mutex<TransportState>,
    close_token: CancellationToken,
    shared: Arc<EngineShared>,
}

impl LocalWebRtcTransport {
    /// Current DTLS handshake state.
    #[must_use]
    pub fn dtls_state(&self) -> DtlsState {
        lock(&self.state).dtls_state
    }

    /// Whether the client's DTLS parameters have been received.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        lock(&self.state).remote_dtls.is_some()
    }

    /// Drive the DTLS state machine from outside, as the real engine's
    /// `dtlsstatechange` event would. A transition to `Closed` closes the
    /// transport itself.
    pub fn set_dtls_state(&self, dtls_state: DtlsState) {
        if dtls_state == DtlsState::Closed {
            self.close();
            return;
        }
        lock(&self.state).dtls_state = dtls_state;
    }
}

#[async_trait]
impl WebRtcTransport for LocalWebRtcTransport {
    fn id(&self) -> &str {
        &self.id
    }

    fn ice_parameters(&self) -> IceParameters {
        self.ice_parameters.clone()
    }

    fn ice_candidates(&self) -> Vec<IceCandidate> {
        self.ice_candidates.clone()
    }

    fn dtls_parameters(&self) -> DtlsParameters {
        self.dtls_parameters.clone()
    }

    async fn connect(&self, dtls_parameters: DtlsParameters) -> Result<(), EngineError> {
        if self.close_token.is_cancelled() {
            return Err(EngineError::TransportClosed);
        }

        let mut state = lock(&self.state);
        state.remote_dtls = Some(dtls_parameters);
        state.dtls_state = DtlsState::Connected;
        Ok(())
    }

    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<Arc<dyn Producer>, EngineError> {
        if self.close_token.is_cancelled() {
            return Err(EngineError::TransportClosed);
        }

        let producer = Arc::new(LocalProducer {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            rtp_parameters,
            closed: AtomicBool::new(false),
        });

        lock(&self.shared.producers).insert(producer.id.clone(), Arc::clone(&producer));

        debug!(
            target: "engine.local",
            transport_id = %self.id,
            producer_id = %producer.id,
            kind = kind.as_str(),
            "Producer created"
        );

        Ok(producer)
    }

    fn close(&self) {
        if self.close_token.is_cancelled() {
            return;
        }

        lock(&self.state).dtls_state = DtlsState::Closed;
        self.close_token.cancel();
        debug!(target: "engine.local", transport_id = %self.id, "Transport closed");
    }

    fn closed(&self) -> CancellationToken {
        self.close_token.clone()
    }
}

/// In-process producer.
pub struct LocalProducer {
    id: String,
    kind: MediaKind,
    rtp_parameters: RtpParameters,
    closed: AtomicBool,
}

impl LocalProducer {
    /// The RTP parameters the client supplied at creation.
    #[must_use]
    pub fn rtp_parameters(&self) -> &RtpParameters {
        &self.rtp_parameters
    }
}

impl Producer for LocalProducer {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(target: "engine.local", producer_id = %self.id, "Producer closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Random alphanumeric token for ICE credentials.
fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random colon-separated SHA-256-shaped fingerprint.
fn random_fingerprint() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<String> = (0..32).map(|_| format!("{:02X}", rng.gen::<u8>())).collect();
    bytes.join(":")
}
