//! # Adapters
//!
//! - `memory`: bucket store held in process memory
//! - `deriver`: SHA-256 based ephemeral ID derivation
//! - `clock`: wall-clock time source

pub mod clock;
pub mod deriver;
pub mod memory;

pub use clock::SystemTimeSource;
pub use deriver::HashEphemeralDeriver;
pub use memory::InMemoryEphemeralRepository;
