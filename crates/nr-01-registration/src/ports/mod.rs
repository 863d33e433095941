//! # Ports Module
//!
//! Inbound (API) and outbound (SPI) boundaries of the Registration subsystem.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
