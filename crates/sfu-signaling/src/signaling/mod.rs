//! Signaling wire layer: frame types, the per-connection loop, and the
//! WebSocket accept loop.

pub mod connection;
pub mod events;
pub mod server;

pub use connection::Connection;
pub use server::SignalingServer;
