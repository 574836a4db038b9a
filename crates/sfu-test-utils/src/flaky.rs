//! Fault-injecting engine wrapper.
//!
//! Wraps any `MediaEngine` and fails selected operations on demand, so
//! tests can assert that engine failures surface as error replies and leave
//! the session store untouched. Faults are toggled at runtime through the
//! shared [`FaultInjection`] switchboard.

use async_trait::async_trait;
use media_engine::{
    DtlsParameters, EngineError, IceCandidate, IceParameters, MediaEngine, MediaKind, Producer,
    Router, RtpCapabilities, RtpCodecCapability, RtpParameters, WebRtcTransport,
    WebRtcTransportOptions, Worker, WorkerSettings,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runtime fault switches shared by all resources of one [`FlakyEngine`].
#[derive(Debug, Default)]
pub struct FaultInjection {
    create_router: AtomicBool,
    create_transport: AtomicBool,
    produce: AtomicBool,
}

impl FaultInjection {
    /// Make `create_router` fail while `enabled` is set.
    pub fn fail_create_router(&self, enabled: bool) {
        self.create_router.store(enabled, Ordering::SeqCst);
    }

    /// Make `create_webrtc_transport` fail while `enabled` is set.
    pub fn fail_create_transport(&self, enabled: bool) {
        self.create_transport.store(enabled, Ordering::SeqCst);
    }

    /// Make `produce` fail while `enabled` is set.
    pub fn fail_produce(&self, enabled: bool) {
        self.produce.store(enabled, Ordering::SeqCst);
    }

    fn router_fails(&self) -> bool {
        self.create_router.load(Ordering::SeqCst)
    }

    fn transport_fails(&self) -> bool {
        self.create_transport.load(Ordering::SeqCst)
    }

    fn produce_fails(&self) -> bool {
        self.produce.load(Ordering::SeqCst)
    }
}

/// A `MediaEngine` that fails on command.
pub struct FlakyEngine {
    inner: Arc<dyn MediaEngine>,
    faults: Arc<FaultInjection>,
}

impl FlakyEngine {
    /// Wrap `inner` with fresh (all-off) fault switches.
    pub fn new(inner: Arc<dyn MediaEngine>) -> Self {
        Self {
            inner,
            faults: Arc::new(FaultInjection::default()),
        }
    }

    /// The fault switchboard for this engine and everything created from it.
    pub fn faults(&self) -> Arc<FaultInjection> {
        Arc::clone(&self.faults)
    }
}

#[async_trait]
impl MediaEngine for FlakyEngine {
    async fn create_worker(
        &self,
        settings: WorkerSettings,
    ) -> Result<Arc<dyn Worker>, EngineError> {
        let worker = self.inner.create_worker(settings).await?;
        Ok(Arc::new(FlakyWorker {
            inner: worker,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct FlakyWorker {
    inner: Arc<dyn Worker>,
    faults: Arc<FaultInjection>,
}

#[async_trait]
impl Worker for FlakyWorker {
    fn pid(&self) -> u32 {
        self.inner.pid()
    }

    async fn create_router(
        &self,
        codecs: Vec<RtpCodecCapability>,
    ) -> Result<Arc<dyn Router>, EngineError> {
        if self.faults.router_fails() {
            return Err(EngineError::Internal("injected router failure".to_string()));
        }
        let router = self.inner.create_router(codecs).await?;
        Ok(Arc::new(FlakyRouter {
            inner: router,
            faults: Arc::clone(&self.faults),
        }))
    }

    fn died(&self) -> CancellationToken {
        self.inner.died()
    }
}

struct FlakyRouter {
    inner: Arc<dyn Router>,
    faults: Arc<FaultInjection>,
}

#[async_trait]
impl Router for FlakyRouter {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn rtp_capabilities(&self) -> RtpCapabilities {
        self.inner.rtp_capabilities()
    }

    async fn create_webrtc_transport(
        &self,
        options: WebRtcTransportOptions,
    ) -> Result<Arc<dyn WebRtcTransport>, EngineError> {
        if self.faults.transport_fails() {
            return Err(EngineError::Internal(
                "injected transport failure".to_string(),
            ));
        }
        let transport = self.inner.create_webrtc_transport(options).await?;
        Ok(Arc::new(FlakyTransport {
            inner: transport,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct FlakyTransport {
    inner: Arc<dyn WebRtcTransport>,
    faults: Arc<FaultInjection>,
}

#[async_trait]
impl WebRtcTransport for FlakyTransport {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn ice_parameters(&self) -> IceParameters {
        self.inner.ice_parameters()
    }

    fn ice_candidates(&self) -> Vec<IceCandidate> {
        self.inner.ice_candidates()
    }

    fn dtls_parameters(&self) -> DtlsParameters {
        self.inner.dtls_parameters()
    }

    async fn connect(&self, dtls_parameters: DtlsParameters) -> Result<(), EngineError> {
        self.inner.connect(dtls_parameters).await
    }

    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<Arc<dyn Producer>, EngineError> {
        if self.faults.produce_fails() {
            return Err(EngineError::Internal(
                "injected produce failure".to_string(),
            ));
        }
        self.inner.produce(kind, rtp_parameters).await
    }

    fn close(&self) {
        self.inner.close();
    }

    fn closed(&self) -> CancellationToken {
        self.inner.closed()
    }
}
