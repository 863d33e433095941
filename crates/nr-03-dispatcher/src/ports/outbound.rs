//! # Outbound Ports
//!
//! The push backend. Binding and registration lookups use the repository
//! ports of `nr-02-ephemeral` and `nr-01-registration`.

use crate::domain::{PushError, PushPayload};
use async_trait::async_trait;

/// Push backend - outbound port.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `payload` to `token`. Returns the backend's acknowledgement.
    async fn send(&self, token: &str, payload: &PushPayload) -> Result<String, PushError>;
}
