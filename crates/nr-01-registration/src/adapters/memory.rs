//! In-memory registration table.

use crate::ports::RegistrationRepository;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{IdentityHash, Registration, StorageError};
use std::collections::BTreeMap;

/// Registration table held in process memory.
///
/// Ordered by identity hash so `list_all` matches the persistent adapter.
#[derive(Default)]
pub struct InMemoryRegistrationRepository {
    rows: RwLock<BTreeMap<IdentityHash, Registration>>,
}

impl InMemoryRegistrationRepository {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored registrations.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl RegistrationRepository for InMemoryRegistrationRepository {
    async fn upsert(&self, candidate: Registration) -> Result<Registration, StorageError> {
        let mut rows = self.rows.write();
        let row = rows
            .entry(candidate.identity_hash)
            .or_insert_with(|| candidate.clone());
        if row.push_token != candidate.push_token {
            row.push_token = candidate.push_token;
        }
        Ok(row.clone())
    }

    async fn get(
        &self,
        identity_hash: &IdentityHash,
    ) -> Result<Option<Registration>, StorageError> {
        Ok(self.rows.read().get(identity_hash).cloned())
    }

    async fn delete(&self, identity_hash: &IdentityHash) -> Result<bool, StorageError> {
        Ok(self.rows.write().remove(identity_hash).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Registration>, StorageError> {
        Ok(self.rows.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::OffsetBucket;

    fn row(key: &[u8], token: &str, bucket: u32) -> Registration {
        Registration {
            identity_hash: IdentityHash::of_public_key(key),
            identity_id: b"iid".to_vec(),
            public_key: key.to_vec(),
            signature: vec![],
            offset_bucket: OffsetBucket(bucket),
            push_token: token.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_first_row_but_takes_new_token() {
        let repo = InMemoryRegistrationRepository::new();
        repo.upsert(row(b"k", "t1", 3)).await.unwrap();
        let stored = repo.upsert(row(b"k", "t2", 9)).await.unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(stored.push_token, "t2");
        assert_eq!(stored.offset_bucket, OffsetBucket(3));
    }

    #[tokio::test]
    async fn test_list_all_is_ordered_by_hash() {
        let repo = InMemoryRegistrationRepository::new();
        for key in [b"c".as_slice(), b"a", b"b"] {
            repo.upsert(row(key, "t", 0)).await.unwrap();
        }
        let hashes: Vec<_> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.identity_hash)
            .collect();
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes, sorted);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let repo = InMemoryRegistrationRepository::new();
        let reg = repo.upsert(row(b"k", "t", 0)).await.unwrap();
        assert!(repo.delete(&reg.identity_hash).await.unwrap());
        assert!(!repo.delete(&reg.identity_hash).await.unwrap());
        assert!(repo.is_empty());
    }
}
