//! WebSocket accept loop.

use crate::actors::SessionActorHandle;
use crate::errors::SfuError;

use super::connection::Connection;

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The signaling server: accepts TCP connections, upgrades them to
/// WebSockets, and spawns a [`Connection`] task per client.
pub struct SignalingServer {
    listener: TcpListener,
}

impl SignalingServer {
    /// Bind the signaling listener.
    pub async fn bind(addr: &str) -> Result<Self, SfuError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SfuError::Internal(format!("bind {addr} failed: {e}")))?;
        Ok(Self { listener })
    }

    /// The bound address; useful when binding port 0 in tests.
    pub fn local_addr(&self) -> Result<SocketAddr, SfuError> {
        self.listener
            .local_addr()
            .map_err(|e| SfuError::Internal(format!("local_addr failed: {e}")))
    }

    /// Accept connections until `cancel_token` fires.
    pub async fn run(self, session: SessionActorHandle, cancel_token: CancellationToken) {
        match self.local_addr() {
            Ok(addr) => info!(target: "sfu.signaling", %addr, "Signaling server listening"),
            Err(_) => info!(target: "sfu.signaling", "Signaling server listening"),
        }

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!(target: "sfu.signaling", "Signaling server shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, remote_addr)) => {
                            let session = session.clone();
                            let child_token = cancel_token.child_token();
                            tokio::spawn(async move {
                                match tokio_tungstenite::accept_async(stream).await {
                                    Ok(websocket) => {
                                        Connection::new(session, child_token).run(websocket).await;
                                    }
                                    Err(e) => {
                                        debug!(
                                            target: "sfu.signaling",
                                            %remote_addr,
                                            error = %e,
                                            "WebSocket handshake failed"
                                        );
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            warn!(target: "sfu.signaling", error = %e, "Accept failed");
                        }
                    }
                }
            }
        }
    }
}
