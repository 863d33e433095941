//! Atomically swappable topology.

use crate::domain::{ActiveTopology, HostOptions, Topology, TopologyError};
use crate::ports::{NetworkClient, TopologyApi};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Owns the active topology.
///
/// Readers get an `Arc` snapshot; writers swap the whole thing. There is no
/// window where a reader sees a half-applied update.
pub struct TopologyAccessor {
    client: Arc<dyn NetworkClient>,
    options: HostOptions,
    active: RwLock<Option<Arc<ActiveTopology>>>,
}

impl TopologyAccessor {
    /// Accessor with no topology loaded.
    pub fn new(client: Arc<dyn NetworkClient>, options: HostOptions) -> Self {
        Self {
            client,
            options,
            active: RwLock::new(None),
        }
    }

    /// Validate, register the poll host, then swap.
    ///
    /// With `expected` set the swap only happens while that snapshot is
    /// still active. A topology installed in the meantime wins and is
    /// returned instead.
    async fn install(
        &self,
        topology: Topology,
        expected: Option<&Arc<ActiveTopology>>,
    ) -> Result<Arc<ActiveTopology>, TopologyError> {
        topology.validate()?;
        let host = topology
            .poll_host()
            .ok_or_else(|| TopologyError::UnknownPollHost(topology.poll_host.clone()))?;

        let handle = self.client.register_host(host, &self.options).await?;
        let active = Arc::new(ActiveTopology {
            topology,
            poll_host: handle,
            client: Arc::clone(&self.client),
        });

        {
            let mut slot = self.active.write();
            if let Some(expected) = expected {
                let unchanged = slot
                    .as_ref()
                    .map_or(false, |current| Arc::ptr_eq(current, expected));
                if !unchanged {
                    if let Some(newer) = slot.as_ref() {
                        debug!(
                            poll_host = %newer.poll_host.id,
                            "[nr-04] Topology replaced during refresh, keeping newer"
                        );
                        return Ok(Arc::clone(newer));
                    }
                }
            }
            *slot = Some(Arc::clone(&active));
        }

        info!(
            hosts = active.topology.hosts.len(),
            poll_host = %active.poll_host.id,
            "[nr-04] Topology updated"
        );
        Ok(active)
    }
}

#[async_trait]
impl TopologyApi for TopologyAccessor {
    fn current_topology(&self) -> Option<Arc<ActiveTopology>> {
        self.active.read().clone()
    }

    async fn update_topology(
        &self,
        topology: Topology,
    ) -> Result<Arc<ActiveTopology>, TopologyError> {
        self.install(topology, None).await
    }

    async fn refresh(&self) -> Result<Arc<ActiveTopology>, TopologyError> {
        let current = self.current_topology().ok_or(TopologyError::NotLoaded)?;
        let fetched = current.client.fetch_topology(&current.poll_host).await?;
        if fetched == current.topology {
            debug!("[nr-04] Topology unchanged");
            return Ok(current);
        }
        self.install(fetched, Some(&current)).await
    }
}

/// Refresh the topology every `interval` until `shutdown` flips to `true`.
///
/// The first refresh happens one full interval after start.
pub async fn topology_refresh_task(
    accessor: Arc<dyn TopologyApi>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("[nr-04] Topology refresh stopped");
                    return;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = accessor.refresh().await {
                    warn!(error = %e, "[nr-04] Topology refresh failed");
                }
            }
        }
    }
}
