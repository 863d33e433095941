//! # Domain Errors

use shared_types::StorageError;
use thiserror::Error;

/// Ephemeral ID derivation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    /// No identity bytes to derive from.
    #[error("Identity id is empty")]
    EmptyIdentity,

    /// Address space must be between 1 and 64 bits.
    #[error("Unsupported address space size: {0} bits")]
    InvalidAddressSpace(u8),

    /// Backend-specific failure.
    #[error("Derivation failed: {0}")]
    Backend(String),
}

/// Rotation and sweep failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RotationError {
    /// Reading registrations or writing bindings failed.
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    /// Single-identity derivation failed.
    #[error(transparent)]
    Derivation(#[from] DerivationError),
}
