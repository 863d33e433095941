//! # Relay Runtime Library
//!
//! This library exposes the internal modules of the relay runtime for
//! testing. The main entry point is the `main.rs` binary.
//!
//! ## Modules
//!
//! - `container/` - configuration and subsystem wiring
//! - `adapters/` - HTTP network client, push notifier, storage, metrics
//! - `api/` - axum router for registration and topology updates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod api;
pub mod container;

pub use container::{BootstrapError, ConfigError, RelayAdapters, RelayConfig, RelayServices};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
