//! # Epoch Schedule
//!
//! Deterministic bucketing of identities onto a staggered epoch timeline.
//!
//! ## Algorithm
//!
//! 1. Every identity lands in `offset_bucket = H(identity_id) mod bucket_count`.
//! 2. Bucket `b` is phase-shifted by `epoch_length * b / bucket_count`, so
//!    epoch boundaries of different buckets are spread across one epoch
//!    length and rotation work never lands on a single instant.
//! 3. The epoch of bucket `b` at `now` is `(now - shift(b)) / epoch_length`.
//!
//! Bucket `bucket_count - 1` has the largest shift, so at any instant it
//! carries the smallest current epoch. The retention floor is derived from it.

use crate::entities::{Epoch, OffsetBucket, Timestamp};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

/// Largest supported address space, in bits.
pub const MAX_ADDRESS_SPACE_BITS: u8 = 64;

/// Domain separator for offset-bucket hashing.
const OFFSET_DOMAIN: &[u8] = b"offset";

/// Rejected schedule parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Epoch length must be positive and fit in i64 nanoseconds.
    #[error("Invalid epoch length: {0:?}")]
    InvalidEpochLength(Duration),

    /// At least one bucket is required.
    #[error("Bucket count must be at least 1")]
    ZeroBuckets,

    /// An ephemeral ID needs at least one bit.
    #[error("Address space must be at least 1 bit")]
    ZeroAddressSpace,

    /// Address space wider than an ephemeral ID.
    #[error("Address space of {0} bits exceeds 64")]
    AddressSpaceTooLarge(u8),

    /// At least the current epoch must be retained.
    #[error("Retained epochs must be at least 1")]
    ZeroRetention,
}

/// Epoch timeline parameters shared by rotation, derivation and sweeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochSchedule {
    epoch_length_nanos: i64,
    bucket_count: u32,
    address_space_size: u8,
    retained_epochs: u32,
}

impl EpochSchedule {
    /// Validate and build a schedule.
    pub fn new(
        epoch_length: Duration,
        bucket_count: u32,
        address_space_size: u8,
        retained_epochs: u32,
    ) -> Result<Self, ScheduleError> {
        let epoch_length_nanos = i64::try_from(epoch_length.as_nanos())
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ScheduleError::InvalidEpochLength(epoch_length))?;
        if bucket_count == 0 {
            return Err(ScheduleError::ZeroBuckets);
        }
        if address_space_size == 0 {
            return Err(ScheduleError::ZeroAddressSpace);
        }
        if address_space_size > MAX_ADDRESS_SPACE_BITS {
            return Err(ScheduleError::AddressSpaceTooLarge(address_space_size));
        }
        if retained_epochs == 0 {
            return Err(ScheduleError::ZeroRetention);
        }
        Ok(Self {
            epoch_length_nanos,
            bucket_count,
            address_space_size,
            retained_epochs,
        })
    }

    /// Epoch length in nanoseconds.
    pub fn epoch_length_nanos(&self) -> i64 {
        self.epoch_length_nanos
    }

    /// Number of offset buckets.
    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    /// Ephemeral ID address space, in bits.
    pub fn address_space_size(&self) -> u8 {
        self.address_space_size
    }

    /// How many epochs (current included) survive the sweep.
    pub fn retained_epochs(&self) -> u32 {
        self.retained_epochs
    }

    /// Deterministic bucket for an identity.
    pub fn offset_bucket(&self, identity_id: &[u8]) -> OffsetBucket {
        let mut hasher = Sha256::new();
        hasher.update(OFFSET_DOMAIN);
        hasher.update(identity_id);
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let value = u64::from_be_bytes(head) % u64::from(self.bucket_count);
        OffsetBucket(value as u32)
    }

    /// Phase shift of a bucket, in nanoseconds.
    pub fn bucket_shift_nanos(&self, bucket: OffsetBucket) -> i64 {
        let shift = i128::from(self.epoch_length_nanos) * i128::from(bucket.0)
            / i128::from(self.bucket_count);
        shift as i64
    }

    /// Epoch in force for `bucket` at `now`.
    pub fn epoch_at(&self, bucket: OffsetBucket, now: Timestamp) -> Epoch {
        let since = now.as_nanos() - self.bucket_shift_nanos(bucket);
        if since < 0 {
            return Epoch(0);
        }
        Epoch((since / self.epoch_length_nanos) as u64)
    }

    /// Half-open validity window `[start, end)` of `epoch` for `bucket`.
    pub fn window(&self, bucket: OffsetBucket, epoch: Epoch) -> (Timestamp, Timestamp) {
        let shift = i128::from(self.bucket_shift_nanos(bucket));
        let len = i128::from(self.epoch_length_nanos);
        let start = shift + i128::from(epoch.0) * len;
        let clamp = |v: i128| v.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;
        (
            Timestamp::from_nanos(clamp(start)),
            Timestamp::from_nanos(clamp(start + len)),
        )
    }

    /// First instant after `now` at which `bucket` enters a new epoch.
    pub fn next_boundary(&self, bucket: OffsetBucket, now: Timestamp) -> Timestamp {
        let (start, end) = self.window(bucket, self.epoch_at(bucket, now));
        if now < start {
            start
        } else {
            end
        }
    }

    /// Oldest epoch the sweep must keep at `now`.
    pub fn retention_floor(&self, now: Timestamp) -> Epoch {
        let slowest = OffsetBucket(self.bucket_count - 1);
        let current = self.epoch_at(slowest, now).0;
        Epoch((current + 1).saturating_sub(u64::from(self.retained_epochs)))
    }
}

impl Default for EpochSchedule {
    /// 16-minute epochs, 64 buckets, 16-bit address space, current + prior
    /// epoch retained.
    fn default() -> Self {
        Self {
            epoch_length_nanos: 16 * 60 * Timestamp::NANOS_PER_SEC,
            bucket_count: 64,
            address_space_size: 16,
            retained_epochs: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(len_secs: u64, buckets: u32, retained: u32) -> EpochSchedule {
        EpochSchedule::new(Duration::from_secs(len_secs), buckets, 16, retained).unwrap()
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert_eq!(
            EpochSchedule::new(Duration::ZERO, 4, 16, 2),
            Err(ScheduleError::InvalidEpochLength(Duration::ZERO))
        );
        assert_eq!(
            EpochSchedule::new(Duration::from_secs(1), 0, 16, 2),
            Err(ScheduleError::ZeroBuckets)
        );
        assert_eq!(
            EpochSchedule::new(Duration::from_secs(1), 4, 65, 2),
            Err(ScheduleError::AddressSpaceTooLarge(65))
        );
        assert_eq!(
            EpochSchedule::new(Duration::from_secs(1), 4, 0, 2),
            Err(ScheduleError::ZeroAddressSpace)
        );
        assert_eq!(
            EpochSchedule::new(Duration::from_secs(1), 4, 16, 0),
            Err(ScheduleError::ZeroRetention)
        );
    }

    #[test]
    fn test_offset_bucket_is_deterministic_and_in_range() {
        let s = schedule(100, 8, 2);
        for i in 0u8..50 {
            let id = [i; 12];
            let bucket = s.offset_bucket(&id);
            assert!(bucket.0 < 8);
            assert_eq!(bucket, s.offset_bucket(&id));
        }
    }

    #[test]
    fn test_buckets_are_staggered_across_one_epoch() {
        let s = schedule(100, 4, 2);
        assert_eq!(s.bucket_shift_nanos(OffsetBucket(0)), 0);
        assert_eq!(s.bucket_shift_nanos(OffsetBucket(1)), 25 * Timestamp::NANOS_PER_SEC);
        assert_eq!(s.bucket_shift_nanos(OffsetBucket(3)), 75 * Timestamp::NANOS_PER_SEC);
    }

    #[test]
    fn test_epoch_advances_exactly_at_boundary() {
        let s = schedule(100, 4, 2);
        let bucket = OffsetBucket(1);
        let boundary = Timestamp::from_secs(125);
        assert_eq!(s.epoch_at(bucket, boundary.plus_nanos(-1)), Epoch(0));
        assert_eq!(s.epoch_at(bucket, boundary), Epoch(1));
        assert_eq!(s.next_boundary(bucket, Timestamp::from_secs(30)), boundary);
    }

    #[test]
    fn test_before_shift_is_epoch_zero() {
        let s = schedule(100, 4, 2);
        let bucket = OffsetBucket(3);
        assert_eq!(s.epoch_at(bucket, Timestamp::from_secs(10)), Epoch(0));
        assert_eq!(
            s.next_boundary(bucket, Timestamp::from_secs(10)),
            Timestamp::from_secs(75)
        );
    }

    #[test]
    fn test_window_contains_its_epoch() {
        let s = schedule(100, 4, 2);
        let bucket = OffsetBucket(2);
        let now = Timestamp::from_secs(1_234);
        let epoch = s.epoch_at(bucket, now);
        let (start, end) = s.window(bucket, epoch);
        assert!(start <= now && now < end);
        assert_eq!(end.as_nanos() - start.as_nanos(), s.epoch_length_nanos());
    }

    #[test]
    fn test_retention_floor_keeps_current_and_prior() {
        let s = schedule(100, 4, 2);
        // Slowest bucket (shift 75s) is in epoch 9 at t=1000s.
        let now = Timestamp::from_secs(1_000);
        assert_eq!(s.epoch_at(OffsetBucket(3), now), Epoch(9));
        assert_eq!(s.retention_floor(now), Epoch(8));
        assert_eq!(s.retention_floor(Timestamp::from_secs(0)), Epoch(0));
    }
}
