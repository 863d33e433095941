//! Push payload.
//!
//! Carries nothing but the two base64 blobs the device needs to fetch its
//! message. No human-visible notification text is ever sent.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::NotificationData;

/// Data-only push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    /// Base64 message hash.
    #[serde(rename = "MessageHash")]
    pub message_hash: String,
    /// Base64 identity fingerprint.
    #[serde(rename = "IdentityFingerprint")]
    pub identity_fingerprint: String,
}

impl PushPayload {
    /// Encode notification metadata.
    pub fn from_data(data: &NotificationData) -> Self {
        Self {
            message_hash: STANDARD.encode(&data.message_hash),
            identity_fingerprint: STANDARD.encode(&data.identity_fingerprint),
        }
    }

    /// Backend message for `token`: data map plus a silent APNS wake-up.
    pub fn to_message(&self, token: &str) -> Value {
        json!({
            "token": token,
            "data": self,
            "apns": {
                "payload": {
                    "aps": { "content-available": 1 },
                    "MessageHash": self.message_hash,
                    "IdentityFingerprint": self.identity_fingerprint,
                }
            }
        })
    }
}
