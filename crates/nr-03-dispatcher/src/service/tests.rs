//! Dispatcher tests.

use super::*;
use crate::domain::{DispatchConfig, DispatchReport, Hit, PushError};
use crate::ports::DispatchApi;
use crate::test_utils::RecordingNotifier;
use async_trait::async_trait;
use nr_01_registration::{InMemoryRegistrationRepository, RegistrationRepository};
use nr_02_ephemeral::{EphemeralBindingRepository, InMemoryEphemeralRepository};
use shared_types::{
    EphemeralBinding, EphemeralId, Epoch, IdentityHash, NotificationData, OffsetBucket,
    Registration, StorageError,
};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Test Helpers
// =============================================================================

struct Harness {
    dispatcher: Dispatcher,
    notifier: Arc<RecordingNotifier>,
    registrations: Arc<InMemoryRegistrationRepository>,
    bindings: Arc<InMemoryEphemeralRepository>,
}

fn harness_with(notifier: RecordingNotifier, max_in_flight: usize) -> Harness {
    let notifier = Arc::new(notifier);
    let registrations = Arc::new(InMemoryRegistrationRepository::new());
    let bindings = Arc::new(InMemoryEphemeralRepository::new());
    let dispatcher = Dispatcher::new(
        bindings.clone(),
        registrations.clone(),
        notifier.clone(),
        DispatchConfig { max_in_flight },
    );
    Harness {
        dispatcher,
        notifier,
        registrations,
        bindings,
    }
}

fn harness() -> Harness {
    harness_with(RecordingNotifier::new(), 4)
}

impl Harness {
    /// Register `name` with token `token` and bind it to `id` in `epoch`.
    async fn device(&self, name: &str, token: &str, id: i64, epoch: u64) -> IdentityHash {
        let reg = self
            .registrations
            .upsert(Registration {
                identity_hash: IdentityHash::of_public_key(name.as_bytes()),
                identity_id: name.as_bytes().to_vec(),
                public_key: name.as_bytes().to_vec(),
                signature: vec![],
                offset_bucket: OffsetBucket(0),
                push_token: token.to_string(),
            })
            .await
            .unwrap();
        self.bind(reg.identity_hash, id, epoch).await;
        reg.identity_hash
    }

    async fn bind(&self, identity_hash: IdentityHash, id: i64, epoch: u64) {
        self.bindings
            .upsert_many(vec![EphemeralBinding {
                identity_hash,
                ephemeral_id: EphemeralId(id),
                epoch: Epoch(epoch),
                offset_bucket: OffsetBucket(0),
            }])
            .await
            .unwrap();
    }
}

fn hit(id: &str) -> Hit {
    Hit::new(
        id,
        NotificationData {
            message_hash: b"msg".to_vec(),
            identity_fingerprint: b"fp".to_vec(),
        },
    )
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let h = harness();
    let report = h.dispatcher.dispatch(vec![]).await;
    assert_eq!(report, DispatchReport::default());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_hit_reaches_bound_device() {
    let h = harness();
    h.device("I1", "T1", 42, 1).await;

    let report = h.dispatcher.dispatch(vec![hit("42")]).await;

    assert_eq!(report.sent, 1);
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "T1");
    assert_eq!(sent[0].1.message_hash, "bXNn");
}

#[tokio::test]
async fn test_unmatched_and_malformed_hits_are_counted() {
    let h = harness();
    h.device("I1", "T1", 42, 1).await;

    let report = h
        .dispatcher
        .dispatch(vec![hit("7"), hit("not-a-number"), hit("42")])
        .await;

    assert_eq!(report.hits, 3);
    assert_eq!(report.unresolved, 1);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.sent, 1);
}

#[tokio::test]
async fn test_shared_ephemeral_id_notifies_every_holder() {
    let h = harness();
    h.device("I1", "T1", 5, 1).await;
    h.device("I2", "T2", 5, 1).await;

    let report = h.dispatcher.dispatch(vec![hit("5")]).await;

    assert_eq!(report.sent, 2);
    let mut tokens = h.notifier.tokens();
    tokens.sort();
    assert_eq!(tokens, vec!["T1", "T2"]);
}

#[tokio::test]
async fn test_same_identity_in_two_epochs_is_sent_once() {
    let h = harness();
    let hash = h.device("I1", "T1", 9, 1).await;
    h.bind(hash, 9, 2).await;

    let report = h.dispatcher.dispatch(vec![hit("9")]).await;

    assert_eq!(report.sent, 1);
    assert_eq!(report.duplicates, 1);
}

#[tokio::test]
async fn test_orphaned_binding_is_skipped() {
    let h = harness();
    let hash = h.device("I1", "T1", 3, 1).await;
    h.registrations.delete(&hash).await.unwrap();

    let report = h.dispatcher.dispatch(vec![hit("3")]).await;

    assert_eq!(report.orphaned, 1);
    assert!(h.notifier.sent().is_empty());
}

// =============================================================================
// Isolation
// =============================================================================

#[tokio::test]
async fn test_one_failing_token_does_not_abort_batch() {
    let h = harness();
    h.device("I1", "T1", 1, 1).await;
    h.device("I2", "T2", 2, 1).await;
    h.device("I3", "T3", 3, 1).await;
    h.notifier.fail_token("T2");

    let report = h
        .dispatcher
        .dispatch(vec![hit("1"), hit("2"), hit("3")])
        .await;

    assert_eq!(report.sent, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].identity_hash, IdentityHash::of_public_key(b"I2"));
    assert!(matches!(report.failed[0].error, PushError::InvalidToken(_)));
    assert_eq!(report.attempted(), 3);
}

struct BrokenBindings;

#[async_trait]
impl EphemeralBindingRepository for BrokenBindings {
    async fn upsert_many(&self, _b: Vec<EphemeralBinding>) -> Result<usize, StorageError> {
        Ok(0)
    }

    async fn find_by_ephemeral_id(
        &self,
        _id: EphemeralId,
    ) -> Result<Vec<EphemeralBinding>, StorageError> {
        Err(StorageError::Unavailable("index offline".into()))
    }

    async fn purge_epochs_below(&self, _floor: Epoch) -> Result<usize, StorageError> {
        Ok(0)
    }

    async fn list_for_identity(
        &self,
        _h: &IdentityHash,
    ) -> Result<Vec<EphemeralBinding>, StorageError> {
        Ok(vec![])
    }
}

#[tokio::test]
async fn test_lookup_errors_are_reported_not_raised() {
    let notifier = Arc::new(RecordingNotifier::new());
    let dispatcher = Dispatcher::new(
        Arc::new(BrokenBindings),
        Arc::new(InMemoryRegistrationRepository::new()),
        notifier.clone(),
        DispatchConfig::default(),
    );

    let report = dispatcher.dispatch(vec![hit("1"), hit("2")]).await;

    assert_eq!(report.lookup_errors, 2);
    assert!(notifier.sent().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_sends_respect_in_flight_cap() {
    let h = harness_with(RecordingNotifier::with_delay(Duration::from_millis(50)), 2);
    for i in 0..6 {
        h.device(&format!("I{}", i), &format!("T{}", i), i, 1).await;
    }
    let hits = (0..6).map(|i| hit(&i.to_string())).collect();

    let report = h.dispatcher.dispatch(hits).await;

    assert_eq!(report.sent, 6);
    assert_eq!(h.notifier.peak_in_flight(), 2);
}
