//! # NR-02 Ephemeral Rotation
//!
//! Keeps, for every registered identity, the ephemeral ID it holds in the
//! epoch currently in force for its offset bucket, and sweeps bindings
//! that fell out of the retention window.
//!
//! **Subsystem ID:** 2
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Rotation Cycle
//!
//! ```text
//! list_all registrations
//!   └─ group by offset_bucket
//!        └─ bucket epoch changed?  ── no ──> only retry earlier failures
//!             │ yes
//!             └─ derive every member ─> upsert_many ─> mark bucket rotated
//! ```
//!
//! A derivation failure is recorded per identity and retried next cycle.
//! A storage failure aborts the cycle and leaves the bucket unmarked.
//!
//! ## Module Structure
//!
//! ```text
//! nr-02-ephemeral/
//! ├── domain/      # DerivedEphemeral, RotationReport, errors
//! ├── ports/       # RotationApi + repository/deriver/clock traits
//! ├── service/     # RotationManager, background task
//! ├── adapters/    # In-memory bucket store, hash deriver, system clock
//! └── test_utils   # ManualClock, StubEphemeralDeriver (feature = "test-utils")
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::{HashEphemeralDeriver, InMemoryEphemeralRepository, SystemTimeSource};
pub use domain::{DerivationError, DerivedEphemeral, RotationError, RotationFailure, RotationReport};
pub use ports::{EphemeralBindingRepository, EphemeralIdDeriver, RotationApi, TimeSource};
pub use service::{rotation_task, RotationManager};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
