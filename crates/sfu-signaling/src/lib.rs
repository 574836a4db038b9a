//! SFU signaling and session-coordination server.
//!
//! Clients connect over WebSocket, discover or create named rooms, negotiate
//! per-peer send transports, and register producers whose media is forwarded
//! by the engine behind the [`media_engine`] traits.
//!
//! All session state lives in a single [`actors::session::SessionActorHandle`]-fronted
//! actor; the wire layer in [`signaling`] is stateless apart from the
//! connection id it assigns per socket.

#![warn(clippy::pedantic)]

pub mod actors;
pub mod config;
pub mod errors;
pub mod observability;
pub mod signaling;
pub mod store;
