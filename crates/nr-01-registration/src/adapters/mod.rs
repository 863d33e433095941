//! # Adapters
//!
//! - `memory`: `RegistrationRepository` over a `BTreeMap`
//! - `ed25519`: `IdentityVerifier` for Ed25519 identity keys

pub mod ed25519;
pub mod memory;

pub use ed25519::Ed25519IdentityVerifier;
pub use memory::InMemoryRegistrationRepository;
