//! # Network Topology
//!
//! Which hosts make up the routing network and which one is polled.

use super::errors::TopologyError;
use crate::ports::NetworkClient;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One network host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHost {
    /// Stable host identifier.
    pub id: String,
    /// Base address, e.g. `https://gw1.example:11420`.
    pub address: String,
    /// PEM certificate to pin, if any.
    #[serde(default)]
    pub tls_certificate: Option<String>,
}

/// Network topology document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Every known host.
    pub hosts: Vec<NetworkHost>,
    /// Id of the host the scheduler polls.
    pub poll_host: String,
}

impl Topology {
    /// Check the document is usable.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.hosts.is_empty() {
            return Err(TopologyError::NoHosts);
        }
        let mut ids = HashSet::new();
        for host in &self.hosts {
            if !ids.insert(host.id.as_str()) {
                return Err(TopologyError::DuplicateHost(host.id.clone()));
            }
        }
        if !ids.contains(self.poll_host.as_str()) {
            return Err(TopologyError::UnknownPollHost(self.poll_host.clone()));
        }
        Ok(())
    }

    /// The designated poll host.
    pub fn poll_host(&self) -> Option<&NetworkHost> {
        self.hosts.iter().find(|h| h.id == self.poll_host)
    }
}

/// Connection options passed when registering a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostOptions {
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// A host the network client is ready to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostHandle {
    /// Host identifier.
    pub id: String,
    /// Base address.
    pub address: String,
}

/// The topology in force plus everything a cycle needs to poll it.
pub struct ActiveTopology {
    /// The document.
    pub topology: Topology,
    /// Registered poll host.
    pub poll_host: HostHandle,
    /// Client the poll host was registered with.
    pub client: Arc<dyn NetworkClient>,
}

impl fmt::Debug for ActiveTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveTopology")
            .field("hosts", &self.topology.hosts.len())
            .field("poll_host", &self.poll_host)
            .finish()
    }
}
