//! # Domain Entities
//!
//! What a caller presents when it registers, and how the transport tells us
//! whether it was authenticated.

use super::errors::RegistrationError;
use shared_types::IdentityHash;

/// Longest push token accepted, in bytes.
pub const MAX_TOKEN_LEN: usize = 4096;

/// Identity material presented by a caller.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct IdentityClaim {
    /// Long-term intermediary identifier.
    pub identity_id: Vec<u8>,
    /// Public key the identity hash is computed from.
    pub public_key: Vec<u8>,
    /// Signature over `identity_id` by `public_key`.
    pub signature: Vec<u8>,
}

impl IdentityClaim {
    /// Build a claim.
    pub fn new(identity_id: Vec<u8>, public_key: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            identity_id,
            public_key,
            signature,
        }
    }

    /// Hash of the claimed public key.
    pub fn identity_hash(&self) -> IdentityHash {
        IdentityHash::of_public_key(&self.public_key)
    }

    /// Reject structurally empty claims.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if self.identity_id.is_empty() {
            return Err(RegistrationError::MalformedInput(
                "identity id is empty".to_string(),
            ));
        }
        if self.public_key.is_empty() {
            return Err(RegistrationError::MalformedInput(
                "public key is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Caller identity as handed over by the transport that terminated the RPC.
///
/// `is_authenticated` is decided by that transport; this subsystem only
/// refuses to act when it is false.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    /// Whether the transport verified the claim.
    pub is_authenticated: bool,
    /// The presented identity.
    pub claim: IdentityClaim,
}

impl AuthContext {
    /// Context for a verified caller.
    pub fn authenticated(claim: IdentityClaim) -> Self {
        Self {
            is_authenticated: true,
            claim,
        }
    }

    /// Context for a caller the transport could not verify.
    pub fn unauthenticated(claim: IdentityClaim) -> Self {
        Self {
            is_authenticated: false,
            claim,
        }
    }
}

/// Decode a raw push token.
///
/// Tokens are opaque, but must be non-empty UTF-8 no longer than
/// [`MAX_TOKEN_LEN`] bytes.
pub fn parse_token(raw: &[u8]) -> Result<String, RegistrationError> {
    if raw.is_empty() {
        return Err(RegistrationError::MalformedInput(
            "push token is empty".to_string(),
        ));
    }
    if raw.len() > MAX_TOKEN_LEN {
        return Err(RegistrationError::MalformedInput(format!(
            "push token is {} bytes, limit is {}",
            raw.len(),
            MAX_TOKEN_LEN
        )));
    }
    let token = std::str::from_utf8(raw).map_err(|_| {
        RegistrationError::MalformedInput("push token is not valid UTF-8".to_string())
    })?;
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_accepts_utf8() {
        assert_eq!(parse_token(b"fcm:abc").unwrap(), "fcm:abc");
    }

    #[test]
    fn test_parse_token_rejects_empty_and_oversized() {
        assert!(matches!(
            parse_token(b""),
            Err(RegistrationError::MalformedInput(_))
        ));
        let big = vec![b'a'; MAX_TOKEN_LEN + 1];
        assert!(matches!(
            parse_token(&big),
            Err(RegistrationError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_parse_token_rejects_invalid_utf8() {
        assert!(parse_token(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_claim_validation() {
        let ok = IdentityClaim::new(vec![1], vec![2], vec![]);
        assert!(ok.validate().is_ok());
        assert!(IdentityClaim::new(vec![], vec![2], vec![]).validate().is_err());
        assert!(IdentityClaim::new(vec![1], vec![], vec![]).validate().is_err());
    }
}
