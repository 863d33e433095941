//! # HTTP Push Notifier
//!
//! POSTs data-only push messages to an FCM-style endpoint.
//!
//! The request body is [`PushPayload::to_message`]. Status codes map to
//! [`PushError`] as follows:
//!
//! | Status | Error |
//! |--------|-------|
//! | 400, 404 | `InvalidToken` |
//! | 408, 429, 5xx | `Transient` |
//! | other non-2xx | `Rejected` |

use async_trait::async_trait;
use nr_03_dispatcher::{Notifier, PushError, PushPayload};
use reqwest::StatusCode;
use serde::Deserialize;
use shared_types::redact_token;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct SendResponse {
    #[serde(default)]
    name: Option<String>,
}

/// reqwest-backed [`Notifier`].
pub struct HttpPushNotifier {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpPushNotifier {
    /// Notifier posting to `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Transient(format!("push client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            bearer_token,
        })
    }
}

fn classify(status: StatusCode, body: String) -> PushError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => PushError::InvalidToken(body),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => PushError::Transient(body),
        s if s.is_server_error() => PushError::Transient(body),
        s => PushError::Rejected(format!("{}: {}", s, body)),
    }
}

#[async_trait]
impl Notifier for HttpPushNotifier {
    async fn send(&self, token: &str, payload: &PushPayload) -> Result<String, PushError> {
        let message = serde_json::json!({ "message": payload.to_message(token) });
        let mut request = self.client.post(&self.endpoint).json(&message);
        if let Some(bearer) = &self.bearer_token {
            request = request.bearer_auth(bearer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PushError::Transient(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, body));
        }

        let ack = response.json::<SendResponse>().await.unwrap_or_default();
        debug!(token = %redact_token(token), status = %status, "[nr-03] Push accepted");
        Ok(ack.name.unwrap_or_else(|| status.to_string()))
    }
}
