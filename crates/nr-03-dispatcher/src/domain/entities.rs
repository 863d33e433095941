//! # Domain Entities

use super::errors::PushError;
use shared_types::{IdentityHash, NotificationData};

/// One notification event reported by the network.
///
/// `ephemeral_id` is the stringified signed integer the network uses on the
/// wire; it is parsed during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// Ephemeral ID the event was addressed to.
    pub ephemeral_id: String,
    /// Opaque metadata forwarded to the device.
    pub data: NotificationData,
}

impl Hit {
    /// Build a hit.
    pub fn new(ephemeral_id: impl Into<String>, data: NotificationData) -> Self {
        Self {
            ephemeral_id: ephemeral_id.into(),
            data,
        }
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound on concurrent push sends. Zero is treated as one.
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { max_in_flight: 16 }
    }
}

/// A send that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Identity the notification was meant for.
    pub identity_hash: IdentityHash,
    /// Redacted token.
    pub token: String,
    /// Backend error.
    pub error: PushError,
}

/// Aggregate result of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Hits in the batch.
    pub hits: usize,
    /// Notifications accepted by the backend.
    pub sent: usize,
    /// Notifications the backend refused.
    pub failed: Vec<DeliveryFailure>,
    /// Hits whose ephemeral ID did not parse.
    pub malformed: usize,
    /// Hits that matched no binding.
    pub unresolved: usize,
    /// Bindings whose registration no longer exists.
    pub orphaned: usize,
    /// Store lookups that errored.
    pub lookup_errors: usize,
    /// (hit, identity) pairs matched more than once.
    pub duplicates: usize,
}

impl DispatchReport {
    /// Number of sends attempted.
    pub fn attempted(&self) -> usize {
        self.sent + self.failed.len()
    }
}
