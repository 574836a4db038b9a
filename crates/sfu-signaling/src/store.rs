//! In-memory session store.
//!
//! Single-writer: the store is owned by the session actor and every mutation
//! happens inside its message loop. Records hold the engine resource handles,
//! so removing a record is also the point where the engine resource is
//! closed.
//!
//! Rooms are never auto-destroyed when they empty out; an idle room keeps its
//! router until process exit. Transport and producer records accumulate on
//! repeated creation calls. Both behaviors are deliberate and observable
//! through [`StoreSnapshot`].

use crate::errors::SfuError;

use chrono::{DateTime, Utc};
use media_engine::{Producer, Router, WebRtcTransport};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A named room backed by one engine router.
pub struct Room {
    /// Room id; equal to the backing router's id.
    pub id: String,
    /// Room name; at most one live room per name.
    pub name: String,
    /// Backing engine router.
    pub router: Arc<dyn Router>,
    /// Ids of send transports registered in this room, in creation order.
    pub producer_transports: Vec<String>,
    /// Ids of producers registered in this room, in creation order.
    pub producers: Vec<String>,
    /// Reserved for the receive path.
    pub consumer_transports: Vec<String>,
    /// Reserved for the receive path.
    pub consumers: Vec<String>,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Create a new empty room over `router`.
    #[must_use]
    pub fn new(name: String, router: Arc<dyn Router>) -> Self {
        Self {
            id: router.id().to_string(),
            name,
            router,
            producer_transports: Vec::new(),
            producers: Vec::new(),
            consumer_transports: Vec::new(),
            consumers: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A connected peer. The id is the server-assigned connection id.
pub struct Peer {
    /// Connection id.
    pub id: String,
    /// Room the peer most recently created a transport in.
    ///
    /// Left stale on `exitRoom`; only disconnect removes the record.
    pub room_id: String,
}

/// A registered send transport.
pub struct PeerTransport {
    /// Engine transport id.
    pub id: String,
    /// Owning peer's connection id.
    pub peer_id: String,
    /// Room the transport was created in.
    pub room_id: String,
    /// Engine transport handle.
    pub transport: Arc<dyn WebRtcTransport>,
}

/// A registered producer.
pub struct PeerProducer {
    /// Engine producer id.
    pub id: String,
    /// Owning peer's connection id.
    pub peer_id: String,
    /// Transport the producer runs over.
    pub transport_id: String,
    /// Room the producer was created in.
    pub room_id: String,
    /// Engine producer handle.
    pub producer: Arc<dyn Producer>,
}

/// The session store: rooms, peers, transports, producers.
#[derive(Default)]
pub struct SessionStore {
    rooms: HashMap<String, Room>,
    room_ids_by_name: HashMap<String, String>,
    peers: HashMap<String, Peer>,
    transports: HashMap<String, PeerTransport>,
    producers: HashMap<String, PeerProducer>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room. The name mapping is overwritten, so the caller must
    /// have checked [`room_id_by_name`](Self::room_id_by_name) first.
    pub fn insert_room(&mut self, room: Room) {
        self.room_ids_by_name
            .insert(room.name.clone(), room.id.clone());
        self.rooms.insert(room.id.clone(), room);
    }

    /// Look up a room by id.
    #[must_use]
    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Look up a room id by name.
    #[must_use]
    pub fn room_id_by_name(&self, name: &str) -> Option<&String> {
        self.room_ids_by_name.get(name)
    }

    /// Look up a peer by connection id.
    #[must_use]
    pub fn peer(&self, peer_id: &str) -> Option<&Peer> {
        self.peers.get(peer_id)
    }

    /// Create the peer record for a connection, or repoint an existing one
    /// at `room_id`. One peer record per connection, ever.
    pub fn upsert_peer(&mut self, peer_id: &str, room_id: &str) {
        match self.peers.get_mut(peer_id) {
            Some(peer) => peer.room_id = room_id.to_string(),
            None => {
                self.peers.insert(
                    peer_id.to_string(),
                    Peer {
                        id: peer_id.to_string(),
                        room_id: room_id.to_string(),
                    },
                );
            }
        }
    }

    /// Register a send transport and append it to its room's list.
    ///
    /// Returns an error if the room vanished between prepare and commit.
    pub fn insert_transport(&mut self, record: PeerTransport) -> Result<(), SfuError> {
        let room = self
            .rooms
            .get_mut(&record.room_id)
            .ok_or_else(|| SfuError::RoomNotFound(record.room_id.clone()))?;

        room.producer_transports.push(record.id.clone());
        self.transports.insert(record.id.clone(), record);
        Ok(())
    }

    /// Look up a transport by id.
    #[must_use]
    pub fn transport(&self, transport_id: &str) -> Option<&PeerTransport> {
        self.transports.get(transport_id)
    }

    /// Resolve a peer's current send transport in its room.
    ///
    /// Transports accumulate on repeated creation; the most recently
    /// registered one wins, matching what the client negotiated last.
    #[must_use]
    pub fn send_transport_for_peer(&self, peer_id: &str) -> Option<&PeerTransport> {
        let peer = self.peers.get(peer_id)?;
        let room = self.rooms.get(&peer.room_id)?;

        room.producer_transports
            .iter()
            .rev()
            .filter_map(|id| self.transports.get(id))
            .find(|record| record.peer_id == peer_id)
    }

    /// Register a producer and append it to its room's list.
    ///
    /// Returns an error if the transport was closed between prepare and
    /// commit; the caller still owns the engine producer in that case.
    pub fn insert_producer(&mut self, record: PeerProducer) -> Result<(), SfuError> {
        if !self.transports.contains_key(&record.transport_id) {
            let room_name = self
                .rooms
                .get(&record.room_id)
                .map_or_else(|| record.room_id.clone(), |room| room.name.clone());
            return Err(SfuError::TransportNotFound {
                peer_id: record.peer_id.clone(),
                room_name,
            });
        }

        if let Some(room) = self.rooms.get_mut(&record.room_id) {
            room.producers.push(record.id.clone());
        }
        self.producers.insert(record.id.clone(), record);
        Ok(())
    }

    /// Look up a producer by id.
    #[must_use]
    pub fn producer(&self, producer_id: &str) -> Option<&PeerProducer> {
        self.producers.get(producer_id)
    }

    /// Remove a transport record, close its engine transport, and cascade to
    /// its producers. Producers on other transports are untouched.
    ///
    /// Returns the number of producers closed, or `None` if the transport
    /// was already gone, which happens when an explicit exit races the
    /// engine close event.
    pub fn remove_transport_cascade(&mut self, transport_id: &str) -> Option<usize> {
        let record = self.transports.remove(transport_id)?;

        record.transport.close();

        let orphaned: Vec<String> = self
            .producers
            .values()
            .filter(|producer| producer.transport_id == transport_id)
            .map(|producer| producer.id.clone())
            .collect();

        for producer_id in &orphaned {
            if let Some(producer) = self.producers.remove(producer_id) {
                producer.producer.close();
            }
        }

        if let Some(room) = self.rooms.get_mut(&record.room_id) {
            room.producer_transports.retain(|id| id != transport_id);
            room.producers.retain(|id| !orphaned.contains(id));
        }

        debug!(
            target: "sfu.store",
            transport_id,
            peer_id = %record.peer_id,
            closed_producers = orphaned.len(),
            "Transport removed"
        );
        Some(orphaned.len())
    }

    /// Close and remove every transport owned by `peer_id`, cascading to
    /// producers. The peer record itself stays (exitRoom semantics).
    ///
    /// Returns `(transports, producers)` closed.
    pub fn teardown_peer_transports(&mut self, peer_id: &str) -> (usize, usize) {
        let owned: Vec<String> = self
            .transports
            .values()
            .filter(|record| record.peer_id == peer_id)
            .map(|record| record.id.clone())
            .collect();

        let mut producers_closed = 0;
        let mut transports_closed = 0;
        for transport_id in owned {
            if let Some(closed) = self.remove_transport_cascade(&transport_id) {
                transports_closed += 1;
                producers_closed += closed;
            }
        }
        (transports_closed, producers_closed)
    }

    /// Remove a peer record. Transports must be torn down first.
    pub fn remove_peer(&mut self, peer_id: &str) -> bool {
        self.peers.remove(peer_id).is_some()
    }

    /// Close every live transport and producer. Used at shutdown.
    pub fn close_all(&mut self) {
        let transport_ids: Vec<String> = self.transports.keys().cloned().collect();
        for transport_id in transport_ids {
            self.remove_transport_cascade(&transport_id);
        }
    }

    /// Snapshot of the store for logging and the status endpoint.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut rooms: Vec<RoomSnapshot> = self
            .rooms
            .values()
            .map(|room| RoomSnapshot {
                id: room.id.clone(),
                name: room.name.clone(),
                producer_transport_count: room.producer_transports.len(),
                producer_count: room.producers.len(),
                consumer_transport_count: room.consumer_transports.len(),
                consumer_count: room.consumers.len(),
                created_at: room.created_at,
            })
            .collect();
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        StoreSnapshot {
            rooms,
            peer_count: self.peers.len(),
        }
    }
}

/// Point-in-time summary of the session store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Per-room summaries, oldest room first.
    pub rooms: Vec<RoomSnapshot>,
    /// Number of connected peers across all rooms.
    pub peer_count: usize,
}

/// Per-room entry of a [`StoreSnapshot`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Room id.
    pub id: String,
    /// Room name.
    pub name: String,
    /// Registered send transports.
    pub producer_transport_count: usize,
    /// Registered producers.
    pub producer_count: usize,
    /// Reserved for the receive path; always zero today.
    pub consumer_transport_count: usize,
    /// Reserved for the receive path; always zero today.
    pub consumer_count: usize,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
}
