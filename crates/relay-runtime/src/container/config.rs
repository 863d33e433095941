//! # Relay Configuration
//!
//! Unified configuration for all subsystems and runtime parameters.
//!
//! Every field has a default; `NR_*` environment variables override them.
//! Values that fail to parse are rejected rather than silently ignored.

use nr_03_dispatcher::DispatchConfig;
use nr_04_poll_scheduler::{HostOptions, SchedulerConfig};
use relay_telemetry::TelemetryConfig;
use shared_types::{EpochSchedule, ScheduleError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Routing network configuration.
    pub network: NetworkConfig,
    /// Epoch schedule configuration.
    pub epochs: EpochConfig,
    /// Dispatch and push backend configuration.
    pub dispatch: DispatchSettings,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// HTTP API configuration.
    pub api: ApiConfig,
    /// Logging configuration.
    pub telemetry: TelemetryConfig,
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// A setting that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// Storage backend not compiled into this binary.
    #[error("Storage backend {0} is not available in this build")]
    UnsupportedBackend(StorageBackend),

    /// Epoch parameters rejected.
    #[error("Invalid epoch schedule: {0}")]
    Schedule(#[from] ScheduleError),
}

impl RelayConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `NR_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RelayConfig {
            telemetry: TelemetryConfig::from_lookup(&lookup),
            ..Default::default()
        };

        if let Some(ms) = parse_var::<u64, _>(&lookup, "NR_POLL_INTERVAL_MS")? {
            config.network.poll_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var(&lookup, "NR_FAILURE_THRESHOLD")? {
            config.network.failure_threshold = n;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "NR_REQUEST_TIMEOUT_SECS")? {
            config.network.request_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup("NR_TOPOLOGY_PATH").filter(|p| !p.is_empty()) {
            config.network.topology_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "NR_TOPOLOGY_REFRESH_SECS")? {
            config.network.topology_refresh = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "NR_EPOCH_LENGTH_SECS")? {
            config.epochs.epoch_length = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var(&lookup, "NR_BUCKET_COUNT")? {
            config.epochs.bucket_count = n;
        }
        if let Some(bits) = parse_var(&lookup, "NR_ADDRESS_SPACE_BITS")? {
            config.epochs.address_space_bits = bits;
        }
        if let Some(n) = parse_var(&lookup, "NR_RETAINED_EPOCHS")? {
            config.epochs.retained_epochs = n;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "NR_ROTATION_INTERVAL_MS")? {
            config.epochs.rotation_interval = Duration::from_millis(ms);
        }

        if let Some(n) = parse_var(&lookup, "NR_MAX_IN_FLIGHT")? {
            config.dispatch.max_in_flight = n;
        }
        if let Some(url) = lookup("NR_PUSH_ENDPOINT").filter(|u| !u.is_empty()) {
            config.dispatch.push_endpoint = Some(url);
        }
        if let Some(token) = lookup("NR_PUSH_BEARER_TOKEN").filter(|t| !t.is_empty()) {
            config.dispatch.push_bearer_token = Some(token);
        }

        if let Some(backend) = parse_var(&lookup, "NR_STORAGE_BACKEND")? {
            config.storage.backend = backend;
        }
        if let Some(dir) = lookup("NR_DATA_DIR").filter(|d| !d.is_empty()) {
            config.storage.data_dir = PathBuf::from(dir);
        }

        if let Some(addr) = parse_var(&lookup, "NR_API_ADDR")? {
            config.api.listen_addr = addr;
        }

        Ok(config)
    }

    /// Reject settings the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.poll_interval.is_zero() {
            return Err(ConfigError::Zero("poll interval"));
        }
        if self.network.failure_threshold == 0 {
            return Err(ConfigError::Zero("failure threshold"));
        }
        if self.network.request_timeout.is_zero() {
            return Err(ConfigError::Zero("request timeout"));
        }
        if self.network.topology_refresh.is_zero() {
            return Err(ConfigError::Zero("topology refresh interval"));
        }
        if self.epochs.rotation_interval.is_zero() {
            return Err(ConfigError::Zero("rotation interval"));
        }
        if self.dispatch.max_in_flight == 0 {
            return Err(ConfigError::Zero("max in-flight sends"));
        }
        if !self.storage.backend.is_available() {
            return Err(ConfigError::UnsupportedBackend(self.storage.backend));
        }
        self.schedule()?;
        Ok(())
    }

    /// Epoch schedule built from the `epochs` section.
    pub fn schedule(&self) -> Result<EpochSchedule, ConfigError> {
        Ok(EpochSchedule::new(
            self.epochs.epoch_length,
            self.epochs.bucket_count,
            self.epochs.address_space_bits,
            self.epochs.retained_epochs,
        )?)
    }

    /// Poll loop settings.
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.network.poll_interval,
            failure_threshold: self.network.failure_threshold,
        }
    }

    /// Options used when registering network hosts.
    pub fn host_options(&self) -> HostOptions {
        HostOptions {
            request_timeout: self.network.request_timeout,
        }
    }

    /// Dispatcher settings.
    pub fn dispatcher(&self) -> DispatchConfig {
        DispatchConfig {
            max_in_flight: self.dispatch.max_in_flight,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

/// Routing network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Delay between poll cycles.
    pub poll_interval: Duration,
    /// Consecutive failed cycles before the scheduler gives up.
    pub failure_threshold: u32,
    /// Per-request timeout towards network hosts.
    pub request_timeout: Duration,
    /// JSON topology loaded at startup.
    pub topology_path: Option<PathBuf>,
    /// Delay between topology refreshes.
    pub topology_refresh: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            poll_interval: scheduler.poll_interval,
            failure_threshold: scheduler.failure_threshold,
            request_timeout: HostOptions::default().request_timeout,
            topology_path: None,
            topology_refresh: Duration::from_secs(300),
        }
    }
}

/// Epoch schedule configuration.
#[derive(Debug, Clone)]
pub struct EpochConfig {
    /// Length of one epoch.
    pub epoch_length: Duration,
    /// Number of offset buckets.
    pub bucket_count: u32,
    /// Ephemeral ID address space, in bits.
    pub address_space_bits: u8,
    /// Epochs kept by the sweep, current included.
    pub retained_epochs: u32,
    /// Delay between rotation cycles.
    pub rotation_interval: Duration,
}

impl Default for EpochConfig {
    fn default() -> Self {
        let schedule = EpochSchedule::default();
        Self {
            epoch_length: Duration::from_nanos(schedule.epoch_length_nanos().unsigned_abs()),
            bucket_count: schedule.bucket_count(),
            address_space_bits: schedule.address_space_size(),
            retained_epochs: schedule.retained_epochs(),
            rotation_interval: Duration::from_secs(5),
        }
    }
}

/// Dispatch and push backend configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Concurrent sends per batch.
    pub max_in_flight: usize,
    /// Push backend URL. Notifications are only logged when unset.
    pub push_endpoint: Option<String>,
    /// Bearer token sent to the push backend.
    pub push_bearer_token: Option<String>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_in_flight: DispatchConfig::default().max_in_flight,
            push_endpoint: None,
            push_bearer_token: None,
        }
    }
}

/// Where the two relay tables live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Process memory, lost on restart.
    #[default]
    Memory,
    /// RocksDB under `data_dir`.
    RocksDb,
}

impl StorageBackend {
    /// Whether this binary was built with the backend.
    pub fn is_available(&self) -> bool {
        match self {
            StorageBackend::Memory => true,
            StorageBackend::RocksDb => cfg!(feature = "rocksdb"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "rocksdb" => Ok(StorageBackend::RocksDb),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::RocksDb => write!(f, "rocksdb"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Selected backend.
    pub backend: StorageBackend,
    /// Data directory for persistent backends.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Listen address.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 11420)),
        }
    }
}
