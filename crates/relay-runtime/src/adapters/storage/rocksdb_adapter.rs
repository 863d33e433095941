//! # RocksDB Storage Adapter
//!
//! Persistent implementation of both relay tables.
//!
//! ## Column Families
//!
//! - `registrations` - `identity_hash` -> `Registration`
//! - `ephemerals` - `identity_hash || epoch` -> `EphemeralBinding`
//! - `ephemeral_index` - `ephemeral_id || identity_hash || epoch` -> empty
//!
//! Values are bincode encoded. Integers in keys are big-endian so a prefix
//! scan over `ephemerals` returns one identity's bindings oldest first.
//!
//! Writers take the write lock for the whole read-modify-write, so the
//! upsert contracts hold under concurrent callers.

use async_trait::async_trait;
use nr_01_registration::RegistrationRepository;
use nr_02_ephemeral::EphemeralBindingRepository;
use parking_lot::RwLock;
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DBCompressionType, Direction,
    IteratorMode, Options, WriteBatch, WriteOptions, DB,
};
use serde::de::DeserializeOwned;
use shared_types::{
    EphemeralBinding, EphemeralId, Epoch, IdentityHash, Registration, StorageError,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Registration table.
pub const CF_REGISTRATIONS: &str = "registrations";
/// Ephemeral binding table.
pub const CF_EPHEMERALS: &str = "ephemerals";
/// Lookup index from ephemeral ID to binding key.
pub const CF_EPHEMERAL_INDEX: &str = "ephemeral_index";

/// All column families used by the relay
pub const COLUMN_FAMILIES: &[&str] = &[CF_REGISTRATIONS, CF_EPHEMERALS, CF_EPHEMERAL_INDEX];

const BINDING_KEY_LEN: usize = 32 + 8;

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// Maximum number of write buffers (default: 3)
    pub max_write_buffer_number: i32,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/rocksdb".to_string(),
            block_cache_size: 64 * 1024 * 1024,  // 64MB
            write_buffer_size: 16 * 1024 * 1024, // 16MB
            max_write_buffer_number: 3,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Config rooted at `data_dir`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir
                .as_ref()
                .join("rocksdb")
                .to_string_lossy()
                .to_string(),
            ..Default::default()
        }
    }

    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,  // 8MB
            write_buffer_size: 4 * 1024 * 1024, // 4MB
            max_write_buffer_number: 2,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed registration and ephemeral tables.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<RwLock<DB>>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(DBCompressionType::Snappy);

        // Point lookups dominate: registrations by hash, bindings by key.
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors).map_err(|e| {
            StorageError::Unavailable(format!("Failed to open RocksDB: {}", e))
        })?;

        info!(path = %config.path, "[storage] RocksDB opened");
        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            config,
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily, StorageError> {
    db.cf_handle(name)
        .ok_or_else(|| StorageError::Corrupted(format!("missing column family {}", name)))
}

fn db_err(op: &str) -> impl Fn(rocksdb::Error) -> StorageError + '_ {
    move |e| StorageError::Database(format!("RocksDB {} failed: {}", op, e))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(value).map_err(|e| StorageError::Database(format!("encode: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Corrupted(format!("decode: {}", e)))
}

fn binding_key(identity_hash: &IdentityHash, epoch: Epoch) -> Vec<u8> {
    let mut key = Vec::with_capacity(BINDING_KEY_LEN);
    key.extend_from_slice(identity_hash.as_bytes());
    key.extend_from_slice(&epoch.0.to_be_bytes());
    key
}

fn index_key(ephemeral_id: EphemeralId, identity_hash: &IdentityHash, epoch: Epoch) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + BINDING_KEY_LEN);
    key.extend_from_slice(&ephemeral_id.0.to_be_bytes());
    key.extend_from_slice(&binding_key(identity_hash, epoch));
    key
}

/// Every `(key, value)` whose key starts with `prefix`.
fn scan_prefix(
    db: &DB,
    cf: &ColumnFamily,
    prefix: &[u8],
) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, StorageError> {
    let mut results = Vec::new();
    let iter = db.iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
    for item in iter {
        let (key, value) = item.map_err(db_err("scan"))?;
        if !key.starts_with(prefix) {
            break;
        }
        results.push((key, value));
    }
    Ok(results)
}

#[async_trait]
impl RegistrationRepository for RocksDbStore {
    async fn upsert(&self, candidate: Registration) -> Result<Registration, StorageError> {
        let db = self.db.write();
        let table = cf(&db, CF_REGISTRATIONS)?;
        let key = *candidate.identity_hash.as_bytes();

        let stored = match db.get_cf(table, key).map_err(db_err("get"))? {
            Some(bytes) => {
                let mut row: Registration = decode(&bytes)?;
                if row.push_token == candidate.push_token {
                    return Ok(row);
                }
                row.push_token = candidate.push_token;
                row
            }
            None => candidate,
        };

        db.put_cf_opt(table, key, encode(&stored)?, &self.write_options())
            .map_err(db_err("put"))?;
        Ok(stored)
    }

    async fn get(
        &self,
        identity_hash: &IdentityHash,
    ) -> Result<Option<Registration>, StorageError> {
        let db = self.db.read();
        let table = cf(&db, CF_REGISTRATIONS)?;
        match db
            .get_cf(table, identity_hash.as_bytes())
            .map_err(db_err("get"))?
        {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn delete(&self, identity_hash: &IdentityHash) -> Result<bool, StorageError> {
        let db = self.db.write();
        let table = cf(&db, CF_REGISTRATIONS)?;
        let key = identity_hash.as_bytes();
        let existed = db
            .get_pinned_cf(table, key)
            .map_err(db_err("get"))?
            .is_some();
        if existed {
            db.delete_cf_opt(table, key, &self.write_options())
                .map_err(db_err("delete"))?;
        }
        Ok(existed)
    }

    async fn list_all(&self) -> Result<Vec<Registration>, StorageError> {
        let db = self.db.read();
        let table = cf(&db, CF_REGISTRATIONS)?;
        db.iterator_cf(table, IteratorMode::Start)
            .map(|item| {
                let (_, value) = item.map_err(db_err("scan"))?;
                decode(&value)
            })
            .collect()
    }
}

#[async_trait]
impl EphemeralBindingRepository for RocksDbStore {
    async fn upsert_many(&self, bindings: Vec<EphemeralBinding>) -> Result<usize, StorageError> {
        let db = self.db.write();
        let rows = cf(&db, CF_EPHEMERALS)?;
        let index = cf(&db, CF_EPHEMERAL_INDEX)?;

        let written = bindings.len();
        let mut batch = WriteBatch::default();
        // Rows replaced earlier in this batch are not visible through `db`.
        let mut staged: HashMap<Vec<u8>, EphemeralId> = HashMap::new();

        for binding in bindings {
            let key = binding_key(&binding.identity_hash, binding.epoch);
            let previous = match staged.get(&key) {
                Some(id) => Some(*id),
                None => db
                    .get_cf(rows, &key)
                    .map_err(db_err("get"))?
                    .map(|bytes| decode::<EphemeralBinding>(&bytes).map(|b| b.ephemeral_id))
                    .transpose()?,
            };
            if let Some(old_id) = previous {
                batch.delete_cf(
                    index,
                    index_key(old_id, &binding.identity_hash, binding.epoch),
                );
            }
            batch.put_cf(rows, &key, encode(&binding)?);
            batch.put_cf(
                index,
                index_key(binding.ephemeral_id, &binding.identity_hash, binding.epoch),
                b"",
            );
            staged.insert(key, binding.ephemeral_id);
        }

        db.write_opt(batch, &self.write_options())
            .map_err(db_err("batch write"))?;
        Ok(written)
    }

    async fn find_by_ephemeral_id(
        &self,
        ephemeral_id: EphemeralId,
    ) -> Result<Vec<EphemeralBinding>, StorageError> {
        let db = self.db.read();
        let rows = cf(&db, CF_EPHEMERALS)?;
        let index = cf(&db, CF_EPHEMERAL_INDEX)?;

        let prefix = ephemeral_id.0.to_be_bytes();
        let mut found = Vec::new();
        for (key, _) in scan_prefix(&db, index, &prefix)? {
            let row_key = &key[prefix.len()..];
            if let Some(bytes) = db.get_cf(rows, row_key).map_err(db_err("get"))? {
                found.push(decode(&bytes)?);
            }
        }
        Ok(found)
    }

    async fn purge_epochs_below(&self, floor: Epoch) -> Result<usize, StorageError> {
        let db = self.db.write();
        let rows = cf(&db, CF_EPHEMERALS)?;
        let index = cf(&db, CF_EPHEMERAL_INDEX)?;

        let mut batch = WriteBatch::default();
        let mut removed = 0;
        for item in db.iterator_cf(rows, IteratorMode::Start) {
            let (key, value) = item.map_err(db_err("scan"))?;
            let binding: EphemeralBinding = decode(&value)?;
            if binding.epoch < floor {
                batch.delete_cf(rows, &key);
                batch.delete_cf(
                    index,
                    index_key(binding.ephemeral_id, &binding.identity_hash, binding.epoch),
                );
                removed += 1;
            }
        }

        if removed > 0 {
            db.write_opt(batch, &self.write_options())
                .map_err(db_err("batch delete"))?;
        }
        Ok(removed)
    }

    async fn list_for_identity(
        &self,
        identity_hash: &IdentityHash,
    ) -> Result<Vec<EphemeralBinding>, StorageError> {
        let db = self.db.read();
        let rows = cf(&db, CF_EPHEMERALS)?;
        scan_prefix(&db, rows, identity_hash.as_bytes())?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }
}
