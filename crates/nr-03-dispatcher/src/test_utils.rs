//! Test utilities for dispatch.
//!
//! Enable with the `test-utils` feature flag.

use crate::domain::{PushError, PushPayload};
use crate::ports::Notifier;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Notifier that records every send.
///
/// Tokens marked failing get [`PushError::InvalidToken`]. An optional delay
/// makes concurrency observable.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, PushPayload)>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RecordingNotifier {
    /// Notifier that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier that sleeps `delay` inside every send.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make sends to `token` fail.
    pub fn fail_token(&self, token: &str) {
        self.failing.lock().insert(token.to_string());
    }

    /// Every send attempted, in completion order.
    pub fn sent(&self) -> Vec<(String, PushPayload)> {
        self.sent.lock().clone()
    }

    /// Tokens sent to, in completion order.
    pub fn tokens(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Highest number of concurrent sends observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, token: &str, payload: &PushPayload) -> Result<String, PushError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.sent.lock().push((token.to_string(), payload.clone()));
        if self.failing.lock().contains(token) {
            return Err(PushError::InvalidToken(token.to_string()));
        }
        Ok(format!("ack/{}", token))
    }
}
