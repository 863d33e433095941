//! # Production Storage Adapters
//!
//! Persistent registration and ephemeral tables backed by RocksDB.
//!
//! ## Usage
//!
//! Enable the `rocksdb` feature to use these adapters:
//!
//! ```toml
//! relay-runtime = { path = "...", features = ["rocksdb"] }
//! ```
//!
//! Each logical table gets its own column family. Without the feature the
//! runtime falls back to the in-memory repositories of `nr-01` and `nr-02`.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{
    RocksDbConfig, RocksDbStore, COLUMN_FAMILIES, CF_EPHEMERALS, CF_EPHEMERAL_INDEX,
    CF_REGISTRATIONS,
};

pub use nr_01_registration::InMemoryRegistrationRepository;
pub use nr_02_ephemeral::InMemoryEphemeralRepository;
