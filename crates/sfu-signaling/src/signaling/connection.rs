//! Per-connection signaling loop.
//!
//! Each accepted WebSocket gets a `Connection` with a server-assigned UUID;
//! that id doubles as the peer id in the session store. The loop reads
//! frames, dispatches them against the session actor, and writes the reply
//! for acked frames. Socket close, read errors, and server shutdown all end
//! the loop and run disconnect cleanup.

use crate::actors::SessionActorHandle;
use crate::errors::SfuError;

use super::events::{
    ClientEvent, ClientFrame, ProducerCreatedReply, ReplyFrame, TransportCreatedReply,
    TransportParams,
};

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// One signaling connection.
pub struct Connection {
    id: String,
    session: SessionActorHandle,
    cancel_token: CancellationToken,
}

impl Connection {
    /// Create a connection with a fresh server-assigned id.
    #[must_use]
    pub fn new(session: SessionActorHandle, cancel_token: CancellationToken) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session,
            cancel_token,
        }
    }

    /// The connection id; peers are keyed by it.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drive the connection until the socket closes or the server shuts
    /// down, then run disconnect cleanup.
    #[instrument(skip_all, name = "connection", fields(connection_id = %self.id))]
    pub async fn run(self, websocket: WebSocketStream<TcpStream>) {
        info!(target: "sfu.signaling", "Connection established");
        let (mut sink, mut stream) = websocket.split();

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(target: "sfu.signaling", "Connection cancelled by shutdown");
                    break;
                }
                maybe_message = stream.next() => {
                    match maybe_message {
                        Some(Ok(Message::Text(text))) => {
                            let Some(reply) = self.handle_frame(&text).await else {
                                continue;
                            };
                            match serde_json::to_string(&reply) {
                                Ok(json) => {
                                    if sink.send(Message::Text(json)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    warn!(target: "sfu.signaling", error = %e, "Reply serialization failed");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = sink.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {} // binary and pong frames are ignored
                        Some(Err(e)) => {
                            debug!(target: "sfu.signaling", error = %e, "Read error");
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = self.session.disconnect(self.id.clone()).await {
            warn!(target: "sfu.signaling", error = %e, "Disconnect cleanup failed");
        }
        info!(target: "sfu.signaling", "Connection closed");
    }

    /// Parse and dispatch one frame; returns the reply for acked requests.
    async fn handle_frame(&self, text: &str) -> Option<ReplyFrame> {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(target: "sfu.signaling", error = %e, "Dropping unparseable frame");
                return None;
            }
        };

        let ack = frame.ack;
        let result = self.dispatch(frame.event).await?;

        let ack = ack?;
        Some(match result {
            Ok(data) => ReplyFrame { ack, data },
            Err(e) => {
                debug!(target: "sfu.signaling", error = %e, "Request failed");
                ReplyFrame::error(ack, e.client_message())
            }
        })
    }

    /// Dispatch one event; returns `None` for events that never reply.
    async fn dispatch(
        &self,
        event: ClientEvent,
    ) -> Option<Result<serde_json::Value, SfuError>> {
        match event {
            ClientEvent::CreateOrJoinRoom { room_name } => Some(
                self.session
                    .create_or_join_room(room_name)
                    .await
                    .map(serde_json::Value::String),
            ),
            ClientEvent::GetRtpCapabilities { room_id } => {
                Some(self.session.rtp_capabilities(room_id).await.and_then(to_json))
            }
            ClientEvent::CreateSendRtcTransport { room_id } => {
                let result = self
                    .session
                    .create_send_transport(self.id.clone(), room_id)
                    .await
                    .and_then(|created| {
                        to_json(TransportCreatedReply {
                            params: TransportParams {
                                id: created.transport_id,
                                ice_parameters: created.ice_parameters,
                                ice_candidates: created.ice_candidates,
                                dtls_parameters: created.dtls_parameters,
                            },
                            peer_id: created.peer_id,
                        })
                    });
                Some(result)
            }
            ClientEvent::ConnectSendTransport {
                dtls_parameters,
                peer_id,
            } => {
                // No reply even on failure; the client proceeds on its own.
                if let Err(e) = self
                    .session
                    .connect_send_transport(peer_id, dtls_parameters)
                    .await
                {
                    warn!(target: "sfu.signaling", error = %e, "connectSendTransport failed");
                }
                None
            }
            ClientEvent::ProduceMedia {
                kind,
                rtp_parameters,
                peer_id: _,
                room_id: _,
            } => {
                // The peer is resolved from the connection id; the ids the
                // client sent are not trusted.
                let result = self
                    .session
                    .produce_media(self.id.clone(), kind, rtp_parameters)
                    .await
                    .and_then(|created| {
                        to_json(ProducerCreatedReply {
                            producer_id: created.producer_id,
                            transport_id: created.transport_id,
                        })
                    });
                Some(result)
            }
            ClientEvent::ExitRoom {} => {
                if let Err(e) = self.session.exit_room(self.id.clone()).await {
                    warn!(target: "sfu.signaling", error = %e, "exitRoom failed");
                }
                None
            }
        }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value, SfuError> {
    serde_json::to_value(value)
        .map_err(|e| SfuError::Internal(format!("reply serialization failed: {e}")))
}
