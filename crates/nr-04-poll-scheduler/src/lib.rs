//! # NR-04 Poll Scheduler
//!
//! Periodically asks the network's poll host for ephemeral-ID hits and hands
//! them to the dispatcher. Also owns the active network topology.
//!
//! **Subsystem ID:** 4
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Loop State Machine
//!
//! ```text
//!            ┌──────────────── success ───────────────┐
//!            ▼                                         │
//!   Idle ──tick──> Polling ──hits──> Dispatching ──────┘
//!    │  ▲             │
//!    │  └── retry ── Backoff ──threshold──> Failed
//!    │
//!    └──stop──> Stopped
//! ```
//!
//! - Consecutive cycle failures are counted; a successful poll resets the
//!   counter.
//! - Reaching the threshold emits exactly one error on the fatal channel and
//!   ends the loop.
//! - Stop is honoured at iteration boundaries; an in-flight cycle completes.
//!
//! ## Topology
//!
//! [`TopologyAccessor`] holds the active topology behind an atomic swap.
//! Each cycle reads one snapshot; updates never tear a running cycle.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use domain::{
    ActiveTopology, HostHandle, HostOptions, NetworkError, NetworkHost, SchedulerConfig,
    SchedulerError, SchedulerExit, SchedulerState, SchedulerStatus, Topology, TopologyError,
};
pub use ports::{NetworkClient, TopologyApi};
pub use service::{topology_refresh_task, PollScheduler, PollSchedulerHandle, TopologyAccessor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
