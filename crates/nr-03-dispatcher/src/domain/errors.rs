//! # Domain Errors

use thiserror::Error;

/// Push backend failures for a single token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    /// Backend says the token is unknown or expired.
    #[error("Invalid push token: {0}")]
    InvalidToken(String),

    /// Backend refused the message.
    #[error("Push rejected: {0}")]
    Rejected(String),

    /// Backend unreachable or overloaded.
    #[error("Push backend unavailable: {0}")]
    Transient(String),
}

impl PushError {
    /// Whether the same send could succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PushError::Transient(_))
    }
}
