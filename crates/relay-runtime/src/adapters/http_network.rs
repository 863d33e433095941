//! # HTTP Network Client
//!
//! Talks to routing network gateways over HTTPS.
//!
//! ## Endpoints
//!
//! - `GET {address}/v1/notifications` returns the queued hit list
//! - `GET {address}/v1/topology` returns the gateway's topology document
//!
//! Hit payload fields are standard base64 on the wire. A hit whose payload
//! does not decode is logged and dropped; the rest of the list is kept. A host
//! registered with a PEM certificate only trusts that certificate.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use nr_03_dispatcher::Hit;
use nr_04_poll_scheduler::{
    HostHandle, HostOptions, NetworkClient, NetworkError, NetworkHost, Topology,
};
use parking_lot::RwLock;
use relay_telemetry::{metric_inc, DISPATCH_SKIPPED};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::NotificationData;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Hit list as served by a gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitListResponse {
    /// Queued hits.
    #[serde(default)]
    pub hits: Vec<WireHit>,
}

/// One hit on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireHit {
    /// Stringified ephemeral ID.
    pub ephemeral_id: String,
    /// Base64 message hash.
    pub message_hash: String,
    /// Base64 identity fingerprint.
    pub identity_fingerprint: String,
}

impl WireHit {
    /// Decode the payload fields.
    pub fn into_hit(self) -> Result<Hit, NetworkError> {
        let message_hash = STANDARD
            .decode(&self.message_hash)
            .map_err(|e| NetworkError::Protocol(format!("message_hash: {}", e)))?;
        let identity_fingerprint = STANDARD
            .decode(&self.identity_fingerprint)
            .map_err(|e| NetworkError::Protocol(format!("identity_fingerprint: {}", e)))?;
        Ok(Hit::new(
            self.ephemeral_id,
            NotificationData {
                message_hash,
                identity_fingerprint,
            },
        ))
    }
}

/// reqwest-backed [`NetworkClient`].
///
/// `register_host` builds one HTTP client per host id; requests to a host
/// that was never registered are rejected.
#[derive(Default)]
pub struct HttpNetworkClient {
    clients: RwLock<HashMap<String, reqwest::Client>>,
}

impl HttpNetworkClient {
    /// Client with no registered hosts.
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, host: &HostHandle) -> Result<reqwest::Client, NetworkError> {
        self.clients
            .read()
            .get(&host.id)
            .cloned()
            .ok_or_else(|| NetworkError::Rejected(format!("host {} is not registered", host.id)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        host: &HostHandle,
        path: &str,
    ) -> Result<T, NetworkError> {
        let client = self.client_for(host)?;
        let url = format!("{}{}", host.address.trim_end_matches('/'), path);
        let response = client.get(&url).send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Rejected(format!("{} returned {}", url, status)));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| NetworkError::Protocol(e.to_string()))
    }
}

fn map_transport_error(e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout
    } else {
        NetworkError::Unreachable(e.to_string())
    }
}

/// Decode every hit on its own. Undecodable hits are skipped.
fn decode_hits(host_id: &str, wire: Vec<WireHit>) -> Vec<Hit> {
    let mut hits = Vec::with_capacity(wire.len());
    for raw in wire {
        let ephemeral_id = raw.ephemeral_id.clone();
        match raw.into_hit() {
            Ok(hit) => hits.push(hit),
            Err(e) => {
                warn!(
                    host = %host_id,
                    ephemeral_id = %ephemeral_id,
                    error = %e,
                    "[nr-04] Dropping undecodable hit"
                );
                metric_inc!(DISPATCH_SKIPPED, &["malformed"]);
            }
        }
    }
    hits
}

#[async_trait]
impl NetworkClient for HttpNetworkClient {
    async fn request_hit_list(&self, host: &HostHandle) -> Result<Vec<Hit>, NetworkError> {
        let body: HitListResponse = self.get_json(host, "/v1/notifications").await?;
        Ok(decode_hits(&host.id, body.hits))
    }

    async fn fetch_topology(&self, host: &HostHandle) -> Result<Topology, NetworkError> {
        self.get_json(host, "/v1/topology").await
    }

    async fn register_host(
        &self,
        host: &NetworkHost,
        options: &HostOptions,
    ) -> Result<HostHandle, NetworkError> {
        let mut builder = reqwest::Client::builder().timeout(options.request_timeout);
        if let Some(pem) = &host.tls_certificate {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                NetworkError::Rejected(format!("bad certificate for {}: {}", host.id, e))
            })?;
            builder = builder
                .tls_built_in_root_certs(false)
                .add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| NetworkError::Rejected(format!("client for {}: {}", host.id, e)))?;

        if self
            .clients
            .write()
            .insert(host.id.clone(), client)
            .is_some()
        {
            debug!(host = %host.id, "[nr-04] Host connection replaced");
        }
        if host.tls_certificate.is_none() && host.address.starts_with("http://") {
            warn!(host = %host.id, "[nr-04] Host registered without TLS");
        }

        Ok(HostHandle {
            id: host.id.clone(),
            address: host.address.clone(),
        })
    }
}
