//! # Domain Module

pub mod entities;
pub mod errors;
pub mod payload;

pub use entities::*;
pub use errors::*;
pub use payload::*;
