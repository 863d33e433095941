//! Ed25519 identity verifier.

use crate::domain::IdentityClaim;
use crate::ports::IdentityVerifier;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Checks that the claim's signature covers its identity id.
///
/// Keys must be 32-byte compressed Ed25519 points and signatures 64 bytes.
/// Anything else fails verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519IdentityVerifier;

impl IdentityVerifier for Ed25519IdentityVerifier {
    fn verify(&self, claim: &IdentityClaim) -> bool {
        let Ok(key_bytes) = <[u8; 32]>::try_from(claim.public_key.as_slice()) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&claim.signature) else {
            return false;
        };
        key.verify(&claim.identity_id, &signature).is_ok()
    }
}
