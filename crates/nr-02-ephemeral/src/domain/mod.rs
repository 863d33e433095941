//! # Domain Module
//!
//! Derivation results, rotation reports and errors.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
