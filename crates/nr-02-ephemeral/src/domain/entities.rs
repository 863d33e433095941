//! # Domain Entities

use super::errors::DerivationError;
use shared_types::{EphemeralId, IdentityHash, Timestamp};

/// Output of one ephemeral ID derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedEphemeral {
    /// The derived identifier.
    pub ephemeral_id: EphemeralId,
    /// Start of the validity window (inclusive).
    pub valid_from: Timestamp,
    /// End of the validity window (exclusive).
    pub valid_to: Timestamp,
}

/// One registration the cycle could not derive an ID for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationFailure {
    /// Affected identity.
    pub identity_hash: IdentityHash,
    /// Why derivation failed.
    pub error: DerivationError,
}

/// Outcome of one rotation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// Buckets that moved to a new epoch this cycle.
    pub buckets_rotated: usize,
    /// Bindings written (new epochs plus retried identities).
    pub bindings_written: usize,
    /// Registrations whose derivation failed.
    pub failures: Vec<RotationFailure>,
}

impl RotationReport {
    /// Whether the cycle did nothing.
    pub fn is_empty(&self) -> bool {
        self.buckets_rotated == 0 && self.bindings_written == 0 && self.failures.is_empty()
    }
}
