//! # Inbound Ports

use crate::domain::{ActiveTopology, Topology, TopologyError};
use async_trait::async_trait;
use std::sync::Arc;

/// Topology API - inbound port.
#[async_trait]
pub trait TopologyApi: Send + Sync {
    /// Snapshot of the topology in force, if one has been loaded.
    fn current_topology(&self) -> Option<Arc<ActiveTopology>>;

    /// Validate, register the poll host, then swap. On error the previous
    /// topology stays active.
    async fn update_topology(&self, topology: Topology)
        -> Result<Arc<ActiveTopology>, TopologyError>;

    /// Fetch a fresh topology from the current poll host and apply it.
    async fn refresh(&self) -> Result<Arc<ActiveTopology>, TopologyError>;
}
