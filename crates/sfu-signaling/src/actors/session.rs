//! `SessionActor` - single owner of the session store.
//!
//! All room/peer/transport/producer state lives in one actor; mutation is
//! serialized through its mailbox, so no lock guards the store. The message
//! loop never awaits an engine call: requests that need one are split into
//! prepare and commit messages, with the engine call awaited by the issuing
//! connection task in between (see [`super::messages`]).
//!
//! Room creation is deduplicated by name even under concurrency: the first
//! request for an unseen name registers a pending entry and spawns the
//! router creation; requests arriving while it is pending are queued on the
//! entry, and every waiter receives the same room id (or the same failure).
//!
//! Engine-side transport closes feed back in as [`SessionMessage::TransportClosed`]
//! via a per-transport watcher task, and run the same idempotent teardown as
//! an explicit exit.

use crate::errors::SfuError;
use crate::store::{PeerProducer, PeerTransport, Room, SessionStore, StoreSnapshot};

use super::messages::{ProducePrep, ProducerCreated, SessionMessage, TransportCreated};
use super::metrics::SessionMetrics;

use media_engine::{
    DtlsParameters, MediaKind, RtpCapabilities, RtpCodecCapability, RtpParameters, Worker,
    WebRtcTransport, WebRtcTransportOptions,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Channel buffer size for the session actor mailbox.
const SESSION_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `SessionActor`.
///
/// This is the public interface for the signaling layer. Methods that need
/// an engine call run it on the calling task between the prepare and commit
/// messages.
#[derive(Clone)]
pub struct SessionActorHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    transport_options: WebRtcTransportOptions,
}

impl SessionActorHandle {
    /// Create a new `SessionActor` over `worker` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately.
    #[must_use]
    pub fn new(
        worker: Arc<dyn Worker>,
        codecs: Vec<RtpCodecCapability>,
        transport_options: WebRtcTransportOptions,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = SessionActor {
            receiver,
            self_sender: sender.clone(),
            cancel_token: cancel_token.clone(),
            worker,
            codecs,
            store: SessionStore::new(),
            pending_rooms: HashMap::new(),
            metrics,
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
            transport_options,
        }
    }

    /// Find a room by name, creating it if necessary.
    ///
    /// Returns the room id. Concurrent calls for the same unseen name all
    /// resolve to the same room.
    pub async fn create_or_join_room(&self, room_name: String) -> Result<String, SfuError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::CreateOrJoinRoom {
            room_name,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))?
    }

    /// Fetch a room's codec capability set.
    pub async fn rtp_capabilities(&self, room_id: String) -> Result<RtpCapabilities, SfuError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::GetRtpCapabilities {
            room_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))?
    }

    /// Create a send transport for `connection_id` in `room_id`.
    ///
    /// Registers the peer on first call; repeated calls accumulate transport
    /// records. The engine call runs on this task, so a slow engine stalls
    /// only this connection.
    #[instrument(skip_all, name = "create_send_transport", fields(connection_id = %connection_id, room_id = %room_id))]
    pub async fn create_send_transport(
        &self,
        connection_id: String,
        room_id: String,
    ) -> Result<TransportCreated, SfuError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::PrepareSendTransport {
            room_id: room_id.clone(),
            respond_to: tx,
        })
        .await?;
        let router = rx
            .await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))??;

        let transport = router
            .create_webrtc_transport(self.transport_options.clone())
            .await
            .map_err(|e| {
                warn!(target: "sfu.session", room_id = %room_id, error = %e, "Transport creation failed");
                SfuError::TransportCreation(room_id.clone())
            })?;

        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::CommitSendTransport {
            connection_id: connection_id.clone(),
            room_id,
            transport: Arc::clone(&transport),
            respond_to: tx,
        })
        .await?;
        rx.await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))??;

        Ok(TransportCreated {
            peer_id: connection_id,
            transport_id: transport.id().to_string(),
            ice_parameters: transport.ice_parameters(),
            ice_candidates: transport.ice_candidates(),
            dtls_parameters: transport.dtls_parameters(),
        })
    }

    /// Forward client DTLS parameters to a peer's send transport.
    ///
    /// A missing peer or transport is a silent no-op (logged at debug), as
    /// is an engine-side connect failure. Clients get no reply either way.
    pub async fn connect_send_transport(
        &self,
        peer_id: String,
        dtls_parameters: DtlsParameters,
    ) -> Result<(), SfuError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::LookupSendTransport {
            peer_id: peer_id.clone(),
            respond_to: tx,
        })
        .await?;

        let Some(transport) = rx
            .await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))?
        else {
            debug!(
                target: "sfu.session",
                peer_id = %peer_id,
                "connectSendTransport with no matching transport, ignoring"
            );
            return Ok(());
        };

        if let Err(e) = transport.connect(dtls_parameters).await {
            warn!(target: "sfu.session", peer_id = %peer_id, error = %e, "DTLS connect failed");
        }
        Ok(())
    }

    /// Create a producer for the peer behind `connection_id`.
    ///
    /// The peer is resolved by connection id, never by a client-supplied
    /// peer id; a client can only produce on its own transport.
    #[instrument(skip_all, name = "produce_media", fields(connection_id = %connection_id, kind = kind.as_str()))]
    pub async fn produce_media(
        &self,
        connection_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<ProducerCreated, SfuError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::PrepareProduce {
            connection_id: connection_id.clone(),
            respond_to: tx,
        })
        .await?;
        let prep: ProducePrep = rx
            .await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))??;

        let producer = prep
            .transport
            .produce(kind, rtp_parameters)
            .await
            .map_err(|e| {
                warn!(
                    target: "sfu.session",
                    peer_id = %prep.peer_id,
                    transport_id = %prep.transport_id,
                    error = %e,
                    "Produce failed"
                );
                SfuError::ProduceFailed {
                    peer_id: prep.peer_id.clone(),
                    room_name: prep.room_name.clone(),
                }
            })?;

        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::CommitProduce {
            connection_id,
            room_id: prep.room_id,
            transport_id: prep.transport_id,
            producer,
            respond_to: tx,
        })
        .await?;
        rx.await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))?
    }

    /// Tear down a peer's transports after a deliberate exit. The peer
    /// record stays, so the connection can create a new transport later.
    pub async fn exit_room(&self, connection_id: String) -> Result<(), SfuError> {
        self.send(SessionMessage::ExitRoom { connection_id }).await
    }

    /// Tear down a peer entirely after its connection dropped.
    pub async fn disconnect(&self, connection_id: String) -> Result<(), SfuError> {
        self.send(SessionMessage::Disconnect { connection_id })
            .await
    }

    /// Fetch a snapshot of the session store.
    pub async fn status(&self) -> Result<StoreSnapshot, SfuError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::GetStatus { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for per-connection tasks.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    async fn send(&self, message: SessionMessage) -> Result<(), SfuError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| SfuError::Internal(format!("channel send failed: {e}")))
    }
}

/// The `SessionActor` implementation.
///
/// Owns the store and runs the message loop. Every handler is synchronous;
/// anything that must wait happens in a spawned task that reports back
/// through the mailbox.
struct SessionActor {
    receiver: mpsc::Receiver<SessionMessage>,
    /// Sender into our own mailbox, for watcher tasks and completions.
    self_sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    worker: Arc<dyn Worker>,
    /// Codec set every new router is created with.
    codecs: Vec<RtpCodecCapability>,
    store: SessionStore,
    /// Rooms being created, keyed by name, with the waiters to answer.
    pending_rooms: HashMap<String, Vec<oneshot::Sender<Result<String, SfuError>>>>,
    metrics: Arc<SessionMetrics>,
}

impl SessionActor {
    #[instrument(skip_all, name = "session_actor")]
    async fn run(mut self) {
        info!(target: "sfu.session", "Session actor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "sfu.session", "Session actor shutting down");
                    break;
                }
                maybe_message = self.receiver.recv() => {
                    match maybe_message {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(target: "sfu.session", "Session actor channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Reject pending room waiters, then release engine resources.
        for (room_name, waiters) in self.pending_rooms.drain() {
            for waiter in waiters {
                let _ = waiter.send(Err(SfuError::RoomCreation(format!(
                    "shutdown while creating room {room_name}"
                ))));
            }
        }
        self.store.close_all();
        info!(target: "sfu.session", "Session actor stopped");
    }

    fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::CreateOrJoinRoom {
                room_name,
                respond_to,
            } => self.handle_create_or_join_room(room_name, respond_to),
            SessionMessage::RoomCreateCompleted { room_name, result } => {
                self.handle_room_create_completed(room_name, result);
            }
            SessionMessage::GetRtpCapabilities {
                room_id,
                respond_to,
            } => {
                let result = self
                    .store
                    .room(&room_id)
                    .map(|room| room.router.rtp_capabilities())
                    .ok_or(SfuError::RoomNotFound(room_id));
                if result.is_err() {
                    self.metrics.inc_signaling_errors();
                }
                let _ = respond_to.send(result);
            }
            SessionMessage::PrepareSendTransport {
                room_id,
                respond_to,
            } => {
                let result = self
                    .store
                    .room(&room_id)
                    .map(|room| Arc::clone(&room.router))
                    .ok_or(SfuError::RoomNotFound(room_id));
                if result.is_err() {
                    self.metrics.inc_signaling_errors();
                }
                let _ = respond_to.send(result);
            }
            SessionMessage::CommitSendTransport {
                connection_id,
                room_id,
                transport,
                respond_to,
            } => {
                let result = self.commit_send_transport(&connection_id, &room_id, transport);
                let _ = respond_to.send(result);
                self.log_store_summary();
            }
            SessionMessage::LookupSendTransport {
                peer_id,
                respond_to,
            } => {
                let transport = self
                    .store
                    .send_transport_for_peer(&peer_id)
                    .map(|record| Arc::clone(&record.transport));
                let _ = respond_to.send(transport);
            }
            SessionMessage::PrepareProduce {
                connection_id,
                respond_to,
            } => {
                let result = self.prepare_produce(&connection_id);
                if result.is_err() {
                    self.metrics.inc_signaling_errors();
                }
                let _ = respond_to.send(result);
            }
            SessionMessage::CommitProduce {
                connection_id,
                room_id,
                transport_id,
                producer,
                respond_to,
            } => {
                let result =
                    self.commit_produce(&connection_id, &room_id, &transport_id, producer);
                let _ = respond_to.send(result);
                self.log_store_summary();
            }
            SessionMessage::TransportClosed { transport_id } => {
                if let Some(closed_producers) = self.store.remove_transport_cascade(&transport_id)
                {
                    debug!(
                        target: "sfu.session",
                        transport_id = %transport_id,
                        "Engine reported transport closed"
                    );
                    self.metrics.inc_transports_closed();
                    self.metrics.add_producers_closed(closed_producers as u64);
                    self.log_store_summary();
                }
            }
            SessionMessage::ExitRoom { connection_id } => {
                debug!(target: "sfu.session", connection_id = %connection_id, "Peer exited room");
                self.teardown_peer(&connection_id);
                self.log_store_summary();
            }
            SessionMessage::Disconnect { connection_id } => {
                debug!(target: "sfu.session", connection_id = %connection_id, "Peer disconnected");
                self.teardown_peer(&connection_id);
                if self.store.remove_peer(&connection_id) {
                    self.metrics.inc_peers_disconnected();
                }
                self.log_store_summary();
            }
            SessionMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.store.snapshot());
            }
        }
    }

    /// Find-or-create with concurrent requests merged onto one pending entry.
    fn handle_create_or_join_room(
        &mut self,
        room_name: String,
        respond_to: oneshot::Sender<Result<String, SfuError>>,
    ) {
        if let Some(room_id) = self.store.room_id_by_name(&room_name) {
            debug!(target: "sfu.session", room = %room_name, room_id = %room_id, "Joining existing room");
            let _ = respond_to.send(Ok(room_id.clone()));
            return;
        }

        if let Some(waiters) = self.pending_rooms.get_mut(&room_name) {
            debug!(target: "sfu.session", room = %room_name, "Joining pending room creation");
            waiters.push(respond_to);
            return;
        }

        self.pending_rooms.insert(room_name.clone(), vec![respond_to]);

        let worker = Arc::clone(&self.worker);
        let codecs = self.codecs.clone();
        let sender = self.self_sender.clone();
        tokio::spawn(async move {
            let result = worker.create_router(codecs).await;
            let _ = sender
                .send(SessionMessage::RoomCreateCompleted { room_name, result })
                .await;
        });
    }

    fn handle_room_create_completed(
        &mut self,
        room_name: String,
        result: Result<Arc<dyn media_engine::Router>, media_engine::EngineError>,
    ) {
        let waiters = self.pending_rooms.remove(&room_name).unwrap_or_default();

        match result {
            Ok(router) => {
                let room = Room::new(room_name.clone(), router);
                let room_id = room.id.clone();
                self.store.insert_room(room);
                self.metrics.inc_rooms_created();
                info!(
                    target: "sfu.session",
                    room = %room_name,
                    room_id = %room_id,
                    waiters = waiters.len(),
                    "Room created"
                );

                for waiter in waiters {
                    let _ = waiter.send(Ok(room_id.clone()));
                }
                self.log_store_summary();
            }
            Err(e) => {
                warn!(target: "sfu.session", room = %room_name, error = %e, "Room creation failed");
                self.metrics.inc_signaling_errors();
                for waiter in waiters {
                    let _ = waiter.send(Err(SfuError::RoomCreation(e.to_string())));
                }
            }
        }
    }

    fn commit_send_transport(
        &mut self,
        connection_id: &str,
        room_id: &str,
        transport: Arc<dyn WebRtcTransport>,
    ) -> Result<(), SfuError> {
        // Revalidate: prepare and commit straddle the engine call.
        if self.store.room(room_id).is_none() {
            transport.close();
            return Err(SfuError::RoomNotFound(room_id.to_string()));
        }

        let transport_id = transport.id().to_string();
        self.store.upsert_peer(connection_id, room_id);
        self.store.insert_transport(PeerTransport {
            id: transport_id.clone(),
            peer_id: connection_id.to_string(),
            room_id: room_id.to_string(),
            transport: Arc::clone(&transport),
        })?;
        self.metrics.inc_transports_created();

        // Arm the close watcher: engine-side closes run the same teardown
        // as an explicit exit.
        let closed = transport.closed();
        let sender = self.self_sender.clone();
        let cancel = self.cancel_token.clone();
        let watched_id = transport_id.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = closed.cancelled() => {
                    let _ = sender
                        .send(SessionMessage::TransportClosed {
                            transport_id: watched_id,
                        })
                        .await;
                }
            }
        });

        info!(
            target: "sfu.session",
            connection_id = %connection_id,
            room_id = %room_id,
            transport_id = %transport_id,
            "Send transport registered"
        );
        Ok(())
    }

    fn prepare_produce(&self, connection_id: &str) -> Result<ProducePrep, SfuError> {
        let peer = self
            .store
            .peer(connection_id)
            .ok_or_else(|| SfuError::PeerNotFound(connection_id.to_string()))?;

        let room = self
            .store
            .room(&peer.room_id)
            .ok_or_else(|| SfuError::PeerRoomNotFound(peer.id.clone()))?;

        let record = self.store.send_transport_for_peer(connection_id).ok_or_else(|| {
            SfuError::TransportNotFound {
                peer_id: peer.id.clone(),
                room_name: room.name.clone(),
            }
        })?;

        Ok(ProducePrep {
            peer_id: peer.id.clone(),
            room_id: room.id.clone(),
            room_name: room.name.clone(),
            transport_id: record.id.clone(),
            transport: Arc::clone(&record.transport),
        })
    }

    fn commit_produce(
        &mut self,
        connection_id: &str,
        room_id: &str,
        transport_id: &str,
        producer: Arc<dyn media_engine::Producer>,
    ) -> Result<ProducerCreated, SfuError> {
        let producer_id = producer.id().to_string();
        let result = self.store.insert_producer(PeerProducer {
            id: producer_id.clone(),
            peer_id: connection_id.to_string(),
            transport_id: transport_id.to_string(),
            room_id: room_id.to_string(),
            producer: Arc::clone(&producer),
        });

        match result {
            Ok(()) => {
                self.metrics.inc_producers_created();
                info!(
                    target: "sfu.session",
                    connection_id = %connection_id,
                    transport_id = %transport_id,
                    producer_id = %producer_id,
                    "Producer registered"
                );
                Ok(ProducerCreated {
                    producer_id,
                    transport_id: transport_id.to_string(),
                })
            }
            Err(e) => {
                // The transport closed between prepare and commit; the
                // engine producer must not leak.
                producer.close();
                self.metrics.inc_signaling_errors();
                Err(e)
            }
        }
    }

    /// Teardown shared by exit, disconnect, and close-event paths.
    fn teardown_peer(&mut self, connection_id: &str) {
        let (transports_closed, producers_closed) =
            self.store.teardown_peer_transports(connection_id);
        self.metrics.add_transports_closed(transports_closed as u64);
        self.metrics.add_producers_closed(producers_closed as u64);
    }

    /// Debug-level summary of every room after a mutating event.
    fn log_store_summary(&self) {
        let snapshot = self.store.snapshot();
        for room in &snapshot.rooms {
            debug!(
                target: "sfu.session",
                room = %room.name,
                room_id = %room.id,
                producer_transports = room.producer_transport_count,
                producers = room.producer_count,
                consumer_transports = room.consumer_transport_count,
                consumers = room.consumer_count,
                "Room state"
            );
        }
        debug!(
            target: "sfu.session",
            rooms = snapshot.rooms.len(),
            peers = snapshot.peer_count,
            "Store state"
        );
    }
}
