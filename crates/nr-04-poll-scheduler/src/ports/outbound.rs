//! # Outbound Ports

use crate::domain::{HostHandle, HostOptions, NetworkError, NetworkHost, Topology};
use async_trait::async_trait;
use nr_03_dispatcher::Hit;

/// Routing network client - outbound port.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Hits currently queued for this relay at `host`.
    async fn request_hit_list(&self, host: &HostHandle) -> Result<Vec<Hit>, NetworkError>;

    /// Latest topology document known to `host`.
    async fn fetch_topology(&self, host: &HostHandle) -> Result<Topology, NetworkError>;

    /// Prepare a connection to `host`.
    async fn register_host(
        &self,
        host: &NetworkHost,
        options: &HostOptions,
    ) -> Result<HostHandle, NetworkError>;
}
