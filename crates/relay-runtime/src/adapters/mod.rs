//! # Adapters
//!
//! Production implementations of the subsystem ports.
//!
//! - `http_network` - routing network gateways over HTTPS
//! - `http_push` - push backend over HTTPS
//! - `metered` - Prometheus decorators around the subsystem ports
//! - `storage` - RocksDB tables (feature `rocksdb`) and in-memory fallbacks

pub mod http_network;
pub mod http_push;
pub mod metered;
pub mod storage;

pub use http_network::HttpNetworkClient;
pub use http_push::HttpPushNotifier;
pub use metered::{MeteredDispatcher, MeteredNetworkClient, MeteredRotation};
