//! Rotation manager tests.

use super::*;
use crate::adapters::InMemoryEphemeralRepository;
use crate::domain::{DerivationError, RotationError};
use crate::ports::{EphemeralBindingRepository, RotationApi};
use crate::test_utils::{ManualClock, StubEphemeralDeriver};
use async_trait::async_trait;
use nr_01_registration::{
    InMemoryRegistrationRepository, RegistrationObserver, RegistrationRepository,
};
use shared_types::{
    EphemeralBinding, EphemeralId, Epoch, EpochSchedule, IdentityHash, OffsetBucket,
    Registration, StorageError, Timestamp,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Test Helpers
// =============================================================================

/// 100s epochs, 4 buckets shifted by 25s each.
fn schedule() -> EpochSchedule {
    EpochSchedule::new(Duration::from_secs(100), 4, 16, 2).unwrap()
}

fn registration(name: &str, bucket: u32) -> Registration {
    Registration {
        identity_hash: IdentityHash::of_public_key(name.as_bytes()),
        identity_id: name.as_bytes().to_vec(),
        public_key: name.as_bytes().to_vec(),
        signature: vec![],
        offset_bucket: OffsetBucket(bucket),
        push_token: format!("token-{}", name),
    }
}

/// Bucket store whose writes can be switched off.
#[derive(Default)]
struct FlakyBindings {
    inner: InMemoryEphemeralRepository,
    down: AtomicBool,
}

#[async_trait]
impl EphemeralBindingRepository for FlakyBindings {
    async fn upsert_many(&self, bindings: Vec<EphemeralBinding>) -> Result<usize, StorageError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("write refused".into()));
        }
        self.inner.upsert_many(bindings).await
    }

    async fn find_by_ephemeral_id(
        &self,
        ephemeral_id: EphemeralId,
    ) -> Result<Vec<EphemeralBinding>, StorageError> {
        self.inner.find_by_ephemeral_id(ephemeral_id).await
    }

    async fn purge_epochs_below(&self, floor: Epoch) -> Result<usize, StorageError> {
        self.inner.purge_epochs_below(floor).await
    }

    async fn list_for_identity(
        &self,
        identity_hash: &IdentityHash,
    ) -> Result<Vec<EphemeralBinding>, StorageError> {
        self.inner.list_for_identity(identity_hash).await
    }
}

struct Harness {
    manager: Arc<RotationManager>,
    registrations: Arc<InMemoryRegistrationRepository>,
    bindings: Arc<FlakyBindings>,
    deriver: Arc<StubEphemeralDeriver>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let registrations = Arc::new(InMemoryRegistrationRepository::new());
    let bindings = Arc::new(FlakyBindings::default());
    let deriver = Arc::new(StubEphemeralDeriver::new(EphemeralId(1)));
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_000)));
    let manager = Arc::new(RotationManager::new(
        registrations.clone(),
        bindings.clone(),
        deriver.clone(),
        clock.clone(),
        schedule(),
    ));
    Harness {
        manager,
        registrations,
        bindings,
        deriver,
        clock,
    }
}

impl Harness {
    async fn register(&self, name: &str, bucket: u32) -> Registration {
        self.registrations
            .upsert(registration(name, bucket))
            .await
            .unwrap()
    }

    async fn epochs_of(&self, name: &str) -> Vec<Epoch> {
        self.bindings
            .list_for_identity(&IdentityHash::of_public_key(name.as_bytes()))
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.epoch)
            .collect()
    }
}

// =============================================================================
// Rotation
// =============================================================================

#[tokio::test]
async fn test_first_cycle_binds_every_registration() {
    let h = harness();
    h.register("I1", 0).await;
    h.register("I2", 3).await;

    let report = h.manager.rotate_due().await.unwrap();

    assert_eq!(report.buckets_rotated, 2);
    assert_eq!(report.bindings_written, 2);
    // t=1000s: bucket 0 is in epoch 10, bucket 3 (shift 75s) in epoch 9.
    assert_eq!(h.epochs_of("I1").await, vec![Epoch(10)]);
    assert_eq!(h.epochs_of("I2").await, vec![Epoch(9)]);
}

#[tokio::test]
async fn test_same_epoch_is_not_rotated_twice() {
    let h = harness();
    h.register("I1", 0).await;
    h.manager.rotate_due().await.unwrap();
    let calls = h.deriver.calls();

    let report = h.manager.rotate_due().await.unwrap();

    assert!(report.is_empty());
    assert_eq!(h.deriver.calls(), calls);
}

#[tokio::test]
async fn test_only_bucket_crossing_boundary_rotates() {
    let h = harness();
    h.register("I1", 1).await;
    h.register("I2", 2).await;
    h.manager.rotate_due().await.unwrap();

    // Bucket 1 (shift 25s) enters epoch 10 at 1025s; bucket 2 waits for 1050s.
    h.clock.set(Timestamp::from_secs(1_025));
    let report = h.manager.rotate_due().await.unwrap();

    assert_eq!(report.buckets_rotated, 1);
    assert_eq!(h.epochs_of("I1").await, vec![Epoch(9), Epoch(10)]);
    assert_eq!(h.epochs_of("I2").await, vec![Epoch(9)]);
    assert_eq!(h.manager.last_rotated(OffsetBucket(1)), Some(Epoch(10)));
}

#[tokio::test]
async fn test_bindings_stay_unique_per_identity_and_epoch() {
    let h = harness();
    h.register("I1", 0).await;
    h.register("I2", 2).await;

    for step in 0..12 {
        h.manager.rotate_due().await.unwrap();
        h.manager.bind_current(&registration("I1", 0)).await.unwrap();
        h.clock.advance(Duration::from_secs(30 + step));
    }

    for name in ["I1", "I2"] {
        let epochs = h.epochs_of(name).await;
        let distinct: HashSet<_> = epochs.iter().collect();
        assert_eq!(distinct.len(), epochs.len());
    }
}

#[tokio::test]
async fn test_derivation_failure_is_isolated_and_retried() {
    let h = harness();
    h.register("I1", 0).await;
    h.register("I2", 0).await;
    h.deriver.fail_for(b"I2");

    let report = h.manager.rotate_due().await.unwrap();

    assert_eq!(report.bindings_written, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].identity_hash,
        IdentityHash::of_public_key(b"I2")
    );
    assert!(matches!(report.failures[0].error, DerivationError::Backend(_)));
    assert_eq!(h.manager.pending_retries(), 1);

    // Same epoch: only the failed identity is retried.
    h.deriver.heal(b"I2");
    let report = h.manager.rotate_due().await.unwrap();

    assert_eq!(report.buckets_rotated, 0);
    assert_eq!(report.bindings_written, 1);
    assert_eq!(h.epochs_of("I2").await, vec![Epoch(10)]);
    assert_eq!(h.manager.pending_retries(), 0);
}

#[tokio::test]
async fn test_storage_failure_aborts_cycle_without_marking_bucket() {
    let h = harness();
    h.register("I1", 0).await;
    h.bindings.down.store(true, Ordering::SeqCst);

    let err = h.manager.rotate_due().await.unwrap_err();

    assert!(matches!(err, RotationError::Storage(_)));
    assert_eq!(h.manager.last_rotated(OffsetBucket(0)), None);

    h.bindings.down.store(false, Ordering::SeqCst);
    let report = h.manager.rotate_due().await.unwrap();
    assert_eq!(report.buckets_rotated, 1);
    assert_eq!(h.epochs_of("I1").await, vec![Epoch(10)]);
}

#[tokio::test]
async fn test_bind_current_uses_epoch_of_bucket() {
    let h = harness();
    h.deriver.set(b"I1", EphemeralId(77));

    let binding = h.manager.bind_current(&registration("I1", 3)).await.unwrap();

    assert_eq!(binding.epoch, Epoch(9));
    assert_eq!(binding.ephemeral_id, EphemeralId(77));
    assert_eq!(binding.offset_bucket, OffsetBucket(3));
}

#[tokio::test]
async fn test_observer_hook_binds_immediately() {
    let h = harness();
    let reg = h.register("I1", 0).await;

    h.manager.on_registered(&reg).await.unwrap();

    assert_eq!(h.epochs_of("I1").await, vec![Epoch(10)]);
}

#[tokio::test]
async fn test_observer_hook_reports_derivation_failure() {
    let h = harness();
    h.deriver.fail_for(b"I1");
    let reg = h.register("I1", 0).await;

    assert!(h.manager.on_registered(&reg).await.is_err());
    assert_eq!(h.manager.pending_retries(), 1);
}

// =============================================================================
// Sweep
// =============================================================================

#[tokio::test]
async fn test_purge_epochs_below_floor() {
    let h = harness();
    let hash = IdentityHash::of_public_key(b"I1");
    let rows = (5..=10)
        .map(|e| EphemeralBinding {
            identity_hash: hash,
            ephemeral_id: EphemeralId(e as i64),
            epoch: Epoch(e),
            offset_bucket: OffsetBucket(0),
        })
        .collect();
    h.bindings.upsert_many(rows).await.unwrap();

    let removed = h.manager.purge_epochs_below(Epoch(8)).await.unwrap();

    assert_eq!(removed, 3);
    assert_eq!(h.epochs_of("I1").await, vec![Epoch(8), Epoch(9), Epoch(10)]);
}

#[tokio::test]
async fn test_purge_expired_keeps_current_and_prior_epoch() {
    let h = harness();
    h.register("I1", 0).await;
    h.register("I2", 3).await;

    for _ in 0..5 {
        h.manager.rotate_due().await.unwrap();
        h.clock.advance(Duration::from_secs(100));
    }
    h.manager.rotate_due().await.unwrap();

    // t=1500s: bucket 3 is in epoch 14, so the floor is 13.
    let removed = h.manager.purge_expired().await.unwrap();

    assert!(removed > 0);
    assert_eq!(h.epochs_of("I1").await, vec![Epoch(13), Epoch(14), Epoch(15)]);
    assert_eq!(h.epochs_of("I2").await, vec![Epoch(13), Epoch(14)]);
}

// =============================================================================
// Background Task
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_rotation_task_runs_until_shutdown() {
    let h = harness();
    h.register("I1", 0).await;
    let (tx, rx) = tokio::sync::watch::channel(false);

    let task = tokio::spawn(rotation_task(
        h.manager.clone(),
        Duration::from_secs(1),
        rx,
    ));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(h.epochs_of("I1").await, vec![Epoch(10)]);

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}
