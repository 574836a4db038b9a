//! Observability: health probes and the status endpoint.

pub mod health;

pub use health::{observability_router, HealthState};
