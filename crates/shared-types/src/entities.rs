//! # Core Domain Entities
//!
//! Rows persisted by the two relay tables plus the identifiers they are
//! keyed by.
//!
//! ## Clusters
//!
//! - **Identity**: `IdentityHash`, `Registration`
//! - **Rotation**: `EphemeralId`, `Epoch`, `OffsetBucket`, `EphemeralBinding`
//! - **Time**: `Timestamp`
//! - **Network**: `NotificationData`

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// SHA-256 digest of a device's long-term public key.
///
/// Primary key of the registration table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct IdentityHash(pub [u8; 32]);

impl IdentityHash {
    /// Hash a public key into its identity hash.
    pub fn of_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First four bytes as hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityHash({}..)", self.short())
    }
}

/// A registered device.
///
/// Exactly one row exists per `identity_hash`. Re-registration replaces
/// `push_token` and leaves every other field as first written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Hash of `public_key`.
    pub identity_hash: IdentityHash,
    /// Long-term intermediary identifier the ephemeral IDs derive from.
    pub identity_id: Vec<u8>,
    /// Public key presented at registration.
    pub public_key: Vec<u8>,
    /// Signature presented at registration.
    pub signature: Vec<u8>,
    /// Rotation bucket derived from `identity_id`.
    pub offset_bucket: OffsetBucket,
    /// Token handed to the push backend.
    pub push_token: String,
}

impl Registration {
    /// Token with everything but the last four characters masked.
    pub fn redacted_token(&self) -> String {
        redact_token(&self.push_token)
    }
}

/// Mask a push token for logging.
pub fn redact_token(token: &str) -> String {
    let tail: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{}", tail)
}

// =============================================================================
// CLUSTER B: ROTATION
// =============================================================================

/// Rotating pseudonymous identifier the network uses in place of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EphemeralId(pub i64);

impl fmt::Display for EphemeralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EphemeralId {
    type Err = std::num::ParseIntError;

    /// Parse the stringified integer form the network reports hits in.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(EphemeralId)
    }
}

/// Discrete time window number. Monotonically increasing per bucket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Epoch(pub u64);

impl Epoch {
    /// Next window.
    pub fn next(self) -> Self {
        Epoch(self.0.saturating_add(1))
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Partition of identities used to stagger rotation work across time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct OffsetBucket(pub u32);

impl fmt::Display for OffsetBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which ephemeral ID an identity held during one epoch.
///
/// Keyed by (`identity_hash`, `epoch`); a second write for the same key
/// replaces the row in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralBinding {
    /// Owning registration.
    pub identity_hash: IdentityHash,
    /// Derived identifier for this epoch.
    pub ephemeral_id: EphemeralId,
    /// Window the identifier is valid in.
    pub epoch: Epoch,
    /// Bucket copied from the registration at write time.
    pub offset_bucket: OffsetBucket,
}

impl EphemeralBinding {
    /// Storage key of this row.
    pub fn key(&self) -> (IdentityHash, Epoch) {
        (self.identity_hash, self.epoch)
    }
}

// =============================================================================
// CLUSTER C: TIME
// =============================================================================

/// Wall-clock instant in nanoseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Nanoseconds per second.
    pub const NANOS_PER_SEC: i64 = 1_000_000_000;

    /// Build from nanoseconds.
    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Build from whole seconds.
    pub fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(Self::NANOS_PER_SEC))
    }

    /// Nanoseconds since the Unix epoch.
    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    /// Shift forward by `nanos`.
    pub fn plus_nanos(self, nanos: i64) -> Self {
        Self(self.0.saturating_add(nanos))
    }
}

// =============================================================================
// CLUSTER D: NETWORK
// =============================================================================

/// Opaque metadata the network attaches to a hit.
///
/// Passed through to the push backend untouched; never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NotificationData {
    /// Hash of the message that triggered the hit.
    pub message_hash: Vec<u8>,
    /// Fingerprint the receiving identity uses to match the message.
    pub identity_fingerprint: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_hash_is_sha256_of_public_key() {
        let a = IdentityHash::of_public_key(b"key-a");
        let b = IdentityHash::of_public_key(b"key-a");
        let c = IdentityHash::of_public_key(b"key-b");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string().len(), 64);
    }

    #[test]
    fn test_ephemeral_id_parses_signed_strings() {
        assert_eq!("42".parse::<EphemeralId>().unwrap(), EphemeralId(42));
        assert_eq!(" -7 ".parse::<EphemeralId>().unwrap(), EphemeralId(-7));
        assert!("abc".parse::<EphemeralId>().is_err());
        assert!("".parse::<EphemeralId>().is_err());
    }

    #[test]
    fn test_redact_token_keeps_tail_only() {
        assert_eq!(redact_token("abcdefgh"), "***efgh");
        assert_eq!(redact_token("ab"), "***ab");
    }

    #[test]
    fn test_binding_serde_roundtrip_preserves_key() {
        let binding = EphemeralBinding {
            identity_hash: IdentityHash([9u8; 32]),
            ephemeral_id: EphemeralId(-3),
            epoch: Epoch(12),
            offset_bucket: OffsetBucket(4),
        };
        let json = serde_json::to_string(&binding).unwrap();
        let back: EphemeralBinding = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key(), binding.key());
    }
}
