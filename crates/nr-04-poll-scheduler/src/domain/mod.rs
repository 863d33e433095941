//! # Domain Module
//!
//! Topology documents, scheduler state and errors.

pub mod errors;
pub mod state;
pub mod topology;

pub use errors::*;
pub use state::*;
pub use topology::*;
