//! # Outbound Ports
//!
//! Traits for external dependencies (binding storage, derivation, time).

use crate::domain::{DerivationError, DerivedEphemeral};
use async_trait::async_trait;
use shared_types::{EphemeralBinding, EphemeralId, Epoch, IdentityHash, StorageError, Timestamp};

/// Ephemeral bucket store - outbound port.
///
/// Rows are keyed by (`identity_hash`, `epoch`). Writes to an existing key
/// replace the row in full.
#[async_trait]
pub trait EphemeralBindingRepository: Send + Sync {
    /// Upsert a batch of bindings. Returns the number written.
    async fn upsert_many(&self, bindings: Vec<EphemeralBinding>) -> Result<usize, StorageError>;

    /// Every binding carrying `ephemeral_id`, across identities and epochs.
    async fn find_by_ephemeral_id(
        &self,
        ephemeral_id: EphemeralId,
    ) -> Result<Vec<EphemeralBinding>, StorageError>;

    /// Delete every binding with `epoch < floor`. Returns rows removed.
    async fn purge_epochs_below(&self, floor: Epoch) -> Result<usize, StorageError>;

    /// Bindings of one identity, oldest epoch first.
    async fn list_for_identity(
        &self,
        identity_hash: &IdentityHash,
    ) -> Result<Vec<EphemeralBinding>, StorageError>;
}

/// Ephemeral ID derivation - outbound port.
pub trait EphemeralIdDeriver: Send + Sync {
    /// Ephemeral ID `identity_id` holds at `now` in an address space of
    /// `address_space_size` bits.
    fn derive(
        &self,
        identity_id: &[u8],
        address_space_size: u8,
        now: Timestamp,
    ) -> Result<DerivedEphemeral, DerivationError>;
}

/// Abstract time source for testability.
pub trait TimeSource: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;
}
