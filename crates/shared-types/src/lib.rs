//! # Shared Types Crate
//!
//! Value types shared by all relay subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the `Registration` and `EphemeralBinding`
//!   row shapes are defined here and nowhere else.
//! - **Deterministic Bucketing**: `EpochSchedule` is a pure function of its
//!   configuration and the identity bytes, so bucket and epoch assignments are
//!   stable across restarts.
//! - **Opaque Identifiers**: identity hashes and ephemeral IDs are newtypes;
//!   they are never interpreted beyond equality and ordering.

pub mod entities;
pub mod errors;
pub mod schedule;

pub use entities::*;
pub use errors::*;
pub use schedule::*;
