//! # NR-03 Dispatcher
//!
//! Turns a batch of ephemeral-ID hits into push notifications.
//!
//! **Subsystem ID:** 3
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Batch Flow
//!
//! ```text
//! hits ─> parse ephemeral id ─> bucket store lookup ─> registration lookup
//!                                                            │
//!                     (all lookups finish before any send)   │
//!                                                            ▼
//!                               bounded concurrent Notifier::send
//!                                                            │
//!                                                            ▼
//!                                                     DispatchReport
//! ```
//!
//! One bad token or one failed lookup never aborts the rest of the batch.
//! Nothing here returns an error to the scheduler.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::LogOnlyNotifier;
pub use domain::{
    DeliveryFailure, DispatchConfig, DispatchReport, Hit, PushError, PushPayload,
};
pub use ports::{DispatchApi, Notifier};
pub use service::Dispatcher;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
