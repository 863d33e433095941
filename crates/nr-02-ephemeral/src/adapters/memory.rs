//! In-memory ephemeral bucket store.

use crate::ports::EphemeralBindingRepository;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{EphemeralBinding, EphemeralId, Epoch, IdentityHash, StorageError};
use std::collections::{BTreeMap, BTreeSet, HashMap};

type BindingKey = (IdentityHash, Epoch);

#[derive(Default)]
struct Tables {
    rows: BTreeMap<BindingKey, EphemeralBinding>,
    by_ephemeral: HashMap<EphemeralId, BTreeSet<BindingKey>>,
}

impl Tables {
    fn unindex(&mut self, binding: &EphemeralBinding) {
        if let Some(keys) = self.by_ephemeral.get_mut(&binding.ephemeral_id) {
            keys.remove(&binding.key());
            if keys.is_empty() {
                self.by_ephemeral.remove(&binding.ephemeral_id);
            }
        }
    }
}

/// Bucket store with a secondary index on ephemeral ID.
#[derive(Default)]
pub struct InMemoryEphemeralRepository {
    tables: RwLock<Tables>,
}

impl InMemoryEphemeralRepository {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bindings.
    pub fn len(&self) -> usize {
        self.tables.read().rows.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.read().rows.is_empty()
    }

    /// Every binding, ordered by (identity, epoch).
    pub fn snapshot(&self) -> Vec<EphemeralBinding> {
        self.tables.read().rows.values().cloned().collect()
    }
}

#[async_trait]
impl EphemeralBindingRepository for InMemoryEphemeralRepository {
    async fn upsert_many(&self, bindings: Vec<EphemeralBinding>) -> Result<usize, StorageError> {
        let mut tables = self.tables.write();
        let written = bindings.len();
        for binding in bindings {
            let key = binding.key();
            if let Some(previous) = tables.rows.insert(key, binding.clone()) {
                tables.unindex(&previous);
            }
            tables
                .by_ephemeral
                .entry(binding.ephemeral_id)
                .or_default()
                .insert(key);
        }
        Ok(written)
    }

    async fn find_by_ephemeral_id(
        &self,
        ephemeral_id: EphemeralId,
    ) -> Result<Vec<EphemeralBinding>, StorageError> {
        let tables = self.tables.read();
        let Some(keys) = tables.by_ephemeral.get(&ephemeral_id) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| tables.rows.get(key).cloned())
            .collect())
    }

    async fn purge_epochs_below(&self, floor: Epoch) -> Result<usize, StorageError> {
        let mut tables = self.tables.write();
        let expired: Vec<EphemeralBinding> = tables
            .rows
            .values()
            .filter(|b| b.epoch < floor)
            .cloned()
            .collect();
        for binding in &expired {
            tables.rows.remove(&binding.key());
            tables.unindex(binding);
        }
        Ok(expired.len())
    }

    async fn list_for_identity(
        &self,
        identity_hash: &IdentityHash,
    ) -> Result<Vec<EphemeralBinding>, StorageError> {
        let tables = self.tables.read();
        let start = (*identity_hash, Epoch(0));
        let end = (*identity_hash, Epoch(u64::MAX));
        Ok(tables
            .rows
            .range(start..=end)
            .map(|(_, b)| b.clone())
            .collect())
    }
}
