//! # Domain Module
//!
//! Identity claims, authentication context and registration errors.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
