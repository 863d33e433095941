//! Hash-based ephemeral ID derivation.
//!
//! `id = top_bits(sha256("ephemeral" || identity_id || be_u64(epoch)))`,
//! where the epoch is the one in force for the identity's offset bucket.

use crate::domain::{DerivationError, DerivedEphemeral};
use crate::ports::EphemeralIdDeriver;
use shared_types::{EphemeralId, EpochSchedule, Timestamp, MAX_ADDRESS_SPACE_BITS};
use sha2::{Digest, Sha256};

const EPHEMERAL_DOMAIN: &[u8] = b"ephemeral";

/// Derives IDs on the same epoch timeline the rotation manager uses.
#[derive(Debug, Clone, Copy)]
pub struct HashEphemeralDeriver {
    schedule: EpochSchedule,
}

impl HashEphemeralDeriver {
    /// Deriver bound to `schedule`.
    pub fn new(schedule: EpochSchedule) -> Self {
        Self { schedule }
    }
}

impl EphemeralIdDeriver for HashEphemeralDeriver {
    fn derive(
        &self,
        identity_id: &[u8],
        address_space_size: u8,
        now: Timestamp,
    ) -> Result<DerivedEphemeral, DerivationError> {
        if identity_id.is_empty() {
            return Err(DerivationError::EmptyIdentity);
        }
        if address_space_size == 0 || address_space_size > MAX_ADDRESS_SPACE_BITS {
            return Err(DerivationError::InvalidAddressSpace(address_space_size));
        }

        let bucket = self.schedule.offset_bucket(identity_id);
        let epoch = self.schedule.epoch_at(bucket, now);

        let mut hasher = Sha256::new();
        hasher.update(EPHEMERAL_DOMAIN);
        hasher.update(identity_id);
        hasher.update(epoch.0.to_be_bytes());
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let raw = u64::from_be_bytes(head);

        // Keep the top `address_space_size` bits; a full 64-bit space may
        // produce negative IDs.
        let id = if address_space_size == 64 {
            raw as i64
        } else {
            (raw >> (64 - u32::from(address_space_size))) as i64
        };

        let (valid_from, valid_to) = self.schedule.window(bucket, epoch);
        Ok(DerivedEphemeral {
            ephemeral_id: EphemeralId(id),
            valid_from,
            valid_to,
        })
    }
}
