//! # SFU Test Utilities
//!
//! Shared test utilities for the SFU signaling server.
//!
//! ## Modules
//!
//! - `flaky` - A fault-injecting wrapper around any [`media_engine::MediaEngine`],
//!   for failure-path tests (router, transport, and produce failures on demand)
//! - `fixtures` - Pre-wired engine/worker setups and payload helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sfu_test_utils::{FlakyEngine, fixtures};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let (local, worker) = fixtures::engine_with_worker().await;
//!
//!     let flaky = FlakyEngine::new(local);
//!     flaky.faults().fail_create_router(true);
//!     // Router creation now fails with an injected engine error...
//! }
//! ```

pub mod fixtures;
pub mod flaky;

pub use flaky::{FaultInjection, FlakyEngine};
