//! # Relay Container
//!
//! Configuration and dependency injection for the relay subsystems.

pub mod config;
pub mod services;

pub use config::{
    ApiConfig, ConfigError, DispatchSettings, EpochConfig, NetworkConfig, RelayConfig,
    StorageBackend, StorageConfig,
};
pub use services::{BootstrapError, RelayAdapters, RelayServices};
