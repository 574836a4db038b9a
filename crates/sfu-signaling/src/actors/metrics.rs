//! Session metrics.
//!
//! Lock-free counters incremented from the actor loop and read from the
//! status endpoint. Counters only go up; gauges are derived from the store
//! snapshot instead.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for session activity.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    rooms_created: AtomicU64,
    transports_created: AtomicU64,
    transports_closed: AtomicU64,
    producers_created: AtomicU64,
    producers_closed: AtomicU64,
    peers_disconnected: AtomicU64,
    signaling_errors: AtomicU64,
}

impl SessionMetrics {
    /// Create zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_rooms_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_transports_created(&self) {
        self.transports_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_transports_closed(&self) {
        self.transports_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the closed-transport counter by `count` (peer teardown
    /// closes several at once).
    pub fn add_transports_closed(&self, count: u64) {
        self.transports_closed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_producers_created(&self) {
        self.producers_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the closed-producer counter by `count` (cascades close
    /// several at once).
    pub fn add_producers_closed(&self, count: u64) {
        self.producers_closed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_peers_disconnected(&self) {
        self.peers_disconnected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_signaling_errors(&self) {
        self.signaling_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
            transports_created: self.transports_created.load(Ordering::Relaxed),
            transports_closed: self.transports_closed.load(Ordering::Relaxed),
            producers_created: self.producers_created.load(Ordering::Relaxed),
            producers_closed: self.producers_closed.load(Ordering::Relaxed),
            peers_disconnected: self.peers_disconnected.load(Ordering::Relaxed),
            signaling_errors: self.signaling_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub rooms_created: u64,
    pub transports_created: u64,
    pub transports_closed: u64,
    pub producers_created: u64,
    pub producers_closed: u64,
    pub peers_disconnected: u64,
    pub signaling_errors: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = SessionMetrics::new();
        metrics.inc_rooms_created();
        metrics.inc_transports_created();
        metrics.inc_transports_created();
        metrics.add_producers_closed(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rooms_created, 1);
        assert_eq!(snapshot.transports_created, 2);
        assert_eq!(snapshot.producers_closed, 3);
        assert_eq!(snapshot.signaling_errors, 0);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let metrics = SessionMetrics::new();
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert!(json.get("roomsCreated").is_some());
        assert!(json.get("peersDisconnected").is_some());
    }
}
