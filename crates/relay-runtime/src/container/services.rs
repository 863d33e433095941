//! # Service Wiring
//!
//! Builds every subsystem from the configuration and a set of adapters.
//!
//! ## Initialization Order
//!
//! 1. Adapters: storage, derivation, clock, push backend, network client
//! 2. Rotation manager (the only writer of the bucket store)
//! 3. Registration service, with the rotation manager as observer
//! 4. Dispatcher over both tables
//! 5. Topology accessor
//!
//! The poll scheduler is built last, on demand, because it is consumed by
//! `spawn`.

use crate::adapters::metered::{MeteredDispatcher, MeteredNetworkClient, MeteredRotation};
use crate::adapters::storage::{InMemoryEphemeralRepository, InMemoryRegistrationRepository};
use crate::adapters::{HttpNetworkClient, HttpPushNotifier};
use crate::container::config::{ConfigError, RelayConfig, StorageBackend};
use nr_01_registration::{
    Ed25519IdentityVerifier, IdentityVerifier, RegistrationRepository, RegistrationService,
};
use nr_02_ephemeral::{
    EphemeralBindingRepository, EphemeralIdDeriver, HashEphemeralDeriver, RotationApi,
    RotationManager, SystemTimeSource, TimeSource,
};
use nr_03_dispatcher::{DispatchApi, Dispatcher, LogOnlyNotifier, Notifier, PushError};
use nr_04_poll_scheduler::{
    ActiveTopology, NetworkClient, PollScheduler, Topology, TopologyAccessor, TopologyApi,
    TopologyError,
};
use shared_types::{EpochSchedule, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Startup failures.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Storage backend could not be opened.
    #[error("Storage: {0}")]
    Storage(#[from] StorageError),

    /// Push backend client could not be built.
    #[error("Push backend: {0}")]
    Push(#[from] PushError),

    /// Topology file unreadable or not valid JSON.
    #[error("Topology file {path}: {reason}")]
    TopologyFile {
        /// File that failed.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Topology rejected by the accessor.
    #[error("Topology: {0}")]
    Topology(#[from] TopologyError),
}

/// Concrete implementations of every outbound port.
pub struct RelayAdapters {
    /// Registration table.
    pub registrations: Arc<dyn RegistrationRepository>,
    /// Ephemeral bucket store.
    pub bindings: Arc<dyn EphemeralBindingRepository>,
    /// Ephemeral ID derivation.
    pub deriver: Arc<dyn EphemeralIdDeriver>,
    /// Wall clock.
    pub clock: Arc<dyn TimeSource>,
    /// Push backend.
    pub notifier: Arc<dyn Notifier>,
    /// Routing network client.
    pub network: Arc<dyn NetworkClient>,
    /// Identity claim verification.
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl RelayAdapters {
    /// Adapters selected by `config`.
    pub fn from_config(config: &RelayConfig) -> Result<Self, BootstrapError> {
        let schedule = config.schedule()?;
        let (registrations, bindings) = open_storage(config)?;

        let notifier: Arc<dyn Notifier> = match &config.dispatch.push_endpoint {
            Some(endpoint) => {
                info!(endpoint = %endpoint, "[runtime] Push backend configured");
                Arc::new(HttpPushNotifier::new(
                    endpoint.clone(),
                    config.dispatch.push_bearer_token.clone(),
                    config.network.request_timeout,
                )?)
            }
            None => {
                warn!("[runtime] NR_PUSH_ENDPOINT not set, notifications will only be logged");
                Arc::new(LogOnlyNotifier::new())
            }
        };

        Ok(Self {
            registrations,
            bindings,
            deriver: Arc::new(HashEphemeralDeriver::new(schedule)),
            clock: Arc::new(SystemTimeSource),
            notifier,
            network: Arc::new(HttpNetworkClient::new()),
            verifier: Arc::new(Ed25519IdentityVerifier),
        })
    }
}

type Tables = (
    Arc<dyn RegistrationRepository>,
    Arc<dyn EphemeralBindingRepository>,
);

fn open_storage(config: &RelayConfig) -> Result<Tables, BootstrapError> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("[runtime] Using in-memory storage, registrations are lost on restart");
            Ok((
                Arc::new(InMemoryRegistrationRepository::new()),
                Arc::new(InMemoryEphemeralRepository::new()),
            ))
        }
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb => {
            use crate::adapters::storage::{RocksDbConfig, RocksDbStore};
            let store = Arc::new(RocksDbStore::open(RocksDbConfig::in_dir(
                &config.storage.data_dir,
            ))?);
            Ok((store.clone(), store))
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb => {
            Err(ConfigError::UnsupportedBackend(StorageBackend::RocksDb).into())
        }
    }
}

/// Every subsystem, wired.
pub struct RelayServices {
    /// Configuration the services were built from.
    pub config: RelayConfig,
    /// Epoch schedule shared by rotation and registration.
    pub schedule: EpochSchedule,
    /// Registration store and RPC surface.
    pub registration: Arc<RegistrationService>,
    /// Rotation manager, metered.
    pub rotation: Arc<dyn RotationApi>,
    /// Dispatcher, metered.
    pub dispatcher: Arc<dyn DispatchApi>,
    /// Swappable topology.
    pub topology: Arc<TopologyAccessor>,
    /// Identity claim verification for the HTTP surface.
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl RelayServices {
    /// Wire the subsystems over `adapters`.
    pub fn new(config: RelayConfig, adapters: RelayAdapters) -> Result<Self, BootstrapError> {
        config.validate()?;
        let schedule = config.schedule()?;

        let manager = RotationManager::new(
            adapters.registrations.clone(),
            adapters.bindings.clone(),
            adapters.deriver,
            adapters.clock,
            schedule,
        );
        let rotation = Arc::new(MeteredRotation::new(Arc::new(manager)));

        let registration = Arc::new(
            RegistrationService::new(adapters.registrations.clone(), schedule)
                .with_observer(rotation.clone()),
        );

        let dispatcher = Dispatcher::new(
            adapters.bindings,
            adapters.registrations,
            adapters.notifier,
            config.dispatcher(),
        );
        let dispatcher = Arc::new(MeteredDispatcher::new(Arc::new(dispatcher)));

        let network = Arc::new(MeteredNetworkClient::new(adapters.network));
        let topology = Arc::new(TopologyAccessor::new(network, config.host_options()));

        info!(
            buckets = schedule.bucket_count(),
            address_space = schedule.address_space_size(),
            backend = %config.storage.backend,
            "[runtime] Services wired"
        );

        Ok(Self {
            config,
            schedule,
            registration,
            rotation,
            dispatcher,
            topology,
            verifier: adapters.verifier,
        })
    }

    /// A poll scheduler over the current topology and dispatcher.
    pub fn scheduler(&self) -> PollScheduler {
        let topology: Arc<dyn TopologyApi> = self.topology.clone();
        PollScheduler::new(topology, self.dispatcher.clone(), self.config.scheduler())
    }

    /// Read a JSON topology document from `path` and make it active.
    pub async fn load_topology(&self, path: &Path) -> Result<Arc<ActiveTopology>, BootstrapError> {
        let file_error = |reason: String| BootstrapError::TopologyFile {
            path: path.to_path_buf(),
            reason,
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| file_error(e.to_string()))?;
        let topology: Topology =
            serde_json::from_str(&raw).map_err(|e| file_error(e.to_string()))?;

        let active = self.topology.update_topology(topology).await?;
        info!(
            path = %path.display(),
            hosts = active.topology.hosts.len(),
            poll_host = %active.poll_host.id,
            "[runtime] Topology loaded"
        );
        Ok(active)
    }
}
