//! Actor layer: the session actor, its message types, and metrics.

pub mod messages;
pub mod metrics;
pub mod session;

pub use messages::{ProducerCreated, SessionMessage, TransportCreated};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use session::SessionActorHandle;
