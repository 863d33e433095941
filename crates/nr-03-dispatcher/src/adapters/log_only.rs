//! Notifier that only logs.
//!
//! Used when no push backend endpoint is configured.

use crate::domain::{PushError, PushPayload};
use crate::ports::Notifier;
use async_trait::async_trait;
use shared_types::redact_token;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Logs every send and acknowledges it.
#[derive(Debug, Default)]
pub struct LogOnlyNotifier {
    sequence: AtomicU64,
}

impl LogOnlyNotifier {
    /// New notifier.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for LogOnlyNotifier {
    async fn send(&self, token: &str, payload: &PushPayload) -> Result<String, PushError> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        info!(
            token = %redact_token(token),
            message_hash = %payload.message_hash,
            "[nr-03] Push (log only)"
        );
        Ok(format!("log-only/{}", seq))
    }
}
