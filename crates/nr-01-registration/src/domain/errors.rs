//! # Domain Errors
//!
//! Error types for the Registration subsystem.

use shared_types::{IdentityHash, StorageError};
use thiserror::Error;

/// Registration error types.
///
/// Callers tell retryable from permanent failures via
/// [`RegistrationError::is_retryable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Caller identity was not authenticated by the transport.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Token or identity fields are invalid.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// No registration exists for this identity.
    #[error("Registration not found: {0}")]
    NotFound(IdentityHash),

    /// Storage engine failure.
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl RegistrationError {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistrationError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Failure reported by a [`crate::ports::RegistrationObserver`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Registration observer failed: {0}")]
pub struct ObserverError(pub String);
