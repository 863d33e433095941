//! # NR-01 Registration
//!
//! Durable mapping of long-term device identity to push token.
//!
//! **Subsystem ID:** 1
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Key every device by the SHA-256 of its public key
//! - Idempotent upsert: one row per identity, last token wins
//! - Expose the register/unregister surface to authenticated callers
//! - Hand freshly stored registrations to an observer so the current
//!   ephemeral binding can be written without waiting for a rotation tick
//!
//! ## Error Surface
//!
//! | Variant | Retryable | Meaning |
//! |---------|-----------|---------|
//! | `AuthenticationFailed` | no | caller identity not authenticated |
//! | `MalformedInput` | no | token or identity fields invalid |
//! | `NotFound` | no | unregister of an unknown identity |
//! | `Storage` | if transient | storage engine failure |
//!
//! ## Module Structure
//!
//! ```text
//! nr-01-registration/
//! ├── domain/     # IdentityClaim, AuthContext, RegistrationError
//! ├── ports/      # RegistrationApi + repository/verifier/observer traits
//! ├── service/    # RegistrationService
//! └── adapters/   # In-memory repository, Ed25519 verifier
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{Ed25519IdentityVerifier, InMemoryRegistrationRepository};
pub use domain::{
    parse_token, AuthContext, IdentityClaim, ObserverError, RegistrationError, MAX_TOKEN_LEN,
};
pub use ports::{
    IdentityVerifier, RegistrationApi, RegistrationObserver, RegistrationRepository,
};
pub use service::RegistrationService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
