//! # Outbound Ports
//!
//! Traits for external dependencies (storage, signature checks, rotation).

use crate::domain::{IdentityClaim, ObserverError};
use async_trait::async_trait;
use shared_types::{IdentityHash, Registration, StorageError};

/// Registration table - outbound port.
///
/// At most one row per `identity_hash`.
#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    /// Insert `candidate` if its identity is absent. If present, replace the
    /// stored push token when it differs and leave every other field alone.
    ///
    /// Returns the row as persisted.
    async fn upsert(&self, candidate: Registration) -> Result<Registration, StorageError>;

    /// Fetch one registration.
    async fn get(&self, identity_hash: &IdentityHash)
        -> Result<Option<Registration>, StorageError>;

    /// Remove one registration. Returns whether a row existed.
    async fn delete(&self, identity_hash: &IdentityHash) -> Result<bool, StorageError>;

    /// Every registration, ordered by identity hash.
    async fn list_all(&self) -> Result<Vec<Registration>, StorageError>;
}

/// Signature check over a presented identity claim.
pub trait IdentityVerifier: Send + Sync {
    /// Whether `claim.signature` is a valid signature of
    /// `claim.identity_id` under `claim.public_key`.
    fn verify(&self, claim: &IdentityClaim) -> bool;
}

/// Callback run after a registration has been persisted.
///
/// Used to write the identity's current ephemeral binding immediately.
/// Observer failures never undo the registration.
#[async_trait]
pub trait RegistrationObserver: Send + Sync {
    /// Called once per successful register call.
    async fn on_registered(&self, registration: &Registration) -> Result<(), ObserverError>;
}
