//! # Relay Flows
//!
//! ```text
//! [register] ──on_registered──→ [rotation] ──bindings──→ [bucket store]
//!                                                            │
//! [network host] ──hit list──→ [poll scheduler] ──→ [dispatcher] ──→ [push]
//! ```
//!
//! Every test runs the real services; only the clock, derivation backend,
//! network and push backend are doubles.

#[cfg(test)]
mod tests {
    use super::super::fixture::{self, identity_id, relay, relay_with, DEFAULT_EPHEMERAL};
    use nr_01_registration::RegistrationApi;
    use nr_02_ephemeral::{RotationApi, TimeSource};
    use nr_03_dispatcher::test_utils::RecordingNotifier;
    use nr_03_dispatcher::{Hit, PushPayload};
    use shared_types::{EphemeralId, NotificationData};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    fn hit(id: i64) -> Hit {
        Hit::new(
            id.to_string(),
            NotificationData {
                message_hash: vec![0xAB; 32],
                identity_fingerprint: vec![0xCD; 8],
            },
        )
    }

    #[tokio::test]
    async fn test_register_rotate_poll_delivers_once() {
        let relay = relay();
        let registration = relay.register("a", "T1").await;
        let bucket = registration.offset_bucket;
        let schedule = relay.services.schedule;

        // Registration binds the epoch in force right away.
        let initial = relay.bindings.snapshot();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].ephemeral_id, DEFAULT_EPHEMERAL);

        relay.deriver.set(&identity_id("a"), EphemeralId(4242));
        let boundary = schedule.next_boundary(bucket, relay.clock.now());
        relay.clock.set(boundary);
        let new_epoch = schedule.epoch_at(bucket, boundary);
        assert_eq!(new_epoch, initial[0].epoch.next());

        let report = relay.services.rotation.rotate_due().await.unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.bindings_written, 1);

        let current: Vec<_> = relay
            .bindings
            .snapshot()
            .into_iter()
            .filter(|b| b.epoch == new_epoch)
            .collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].ephemeral_id, EphemeralId(4242));
        assert_eq!(current[0].identity_hash, registration.identity_hash);

        relay.connect().await;
        relay.network.push_hits(vec![hit(4242)]);
        let report = relay.services.scheduler().poll_once().await.unwrap();

        assert_eq!(report.sent, 1);
        let sent = relay.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "T1");
        assert_eq!(sent[0].1, PushPayload::from_data(&hit(4242).data));
    }

    #[tokio::test]
    async fn test_failing_token_does_not_block_others() {
        let relay = relay();
        for (name, id) in [("a", 101), ("b", 102), ("c", 103)] {
            relay.deriver.set(&identity_id(name), EphemeralId(id));
        }
        relay.register("a", "T-a").await;
        let b = relay.register("b", "T-b").await;
        relay.register("c", "T-c").await;
        relay.notifier.fail_token("T-b");
        relay.connect().await;

        relay
            .network
            .push_hits(vec![hit(101), hit(102), hit(103)]);
        let report = relay.services.scheduler().poll_once().await.unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].identity_hash, b.identity_hash);
        assert_eq!(relay.notifier.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_shared_ephemeral_notifies_every_holder() {
        let relay = relay();
        relay.register("a", "T-a").await;
        relay.register("b", "T-b").await;
        relay.connect().await;

        relay
            .network
            .push_hits(vec![hit(DEFAULT_EPHEMERAL.0)]);
        let report = relay.services.scheduler().poll_once().await.unwrap();

        assert_eq!(report.sent, 2);
        let mut tokens = relay.notifier.tokens();
        tokens.sort();
        assert_eq!(tokens, vec!["T-a".to_string(), "T-b".to_string()]);
    }

    #[tokio::test]
    async fn test_reregistration_moves_delivery_to_new_token() {
        let relay = relay();
        let first = relay.register("a", "T-old").await;
        let second = relay.register("a", "T-new").await;
        assert_eq!(first.identity_hash, second.identity_hash);
        assert_eq!(first.offset_bucket, second.offset_bucket);
        assert_eq!(relay.registrations.len(), 1);
        relay.connect().await;

        relay
            .network
            .push_hits(vec![hit(DEFAULT_EPHEMERAL.0)]);
        relay.services.scheduler().poll_once().await.unwrap();

        assert_eq!(relay.notifier.tokens(), vec!["T-new".to_string()]);
    }

    #[tokio::test]
    async fn test_unregistered_identity_is_not_notified() {
        let relay = relay();
        relay.register("a", "T1").await;
        relay
            .services
            .registration
            .unregister_for_notifications(&fixture::auth("a"))
            .await
            .unwrap();
        relay.connect().await;

        relay
            .network
            .push_hits(vec![hit(DEFAULT_EPHEMERAL.0)]);
        let report = relay.services.scheduler().poll_once().await.unwrap();

        assert_eq!(report.sent, 0);
        assert_eq!(report.orphaned, 1);
        assert!(relay.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_expires_old_identifiers() {
        let relay = relay();
        relay.register("a", "T1").await;
        relay.deriver.set(&identity_id("a"), EphemeralId(8));

        relay.clock.advance(Duration::from_secs(3 * 60));
        relay.services.rotation.rotate_due().await.unwrap();
        let removed = relay.services.rotation.purge_expired().await.unwrap();
        assert_eq!(removed, 1);
        relay.connect().await;

        relay
            .network
            .push_hits(vec![hit(DEFAULT_EPHEMERAL.0), hit(8)]);
        let report = relay.services.scheduler().poll_once().await.unwrap();

        assert_eq!(report.unresolved, 1);
        assert_eq!(report.sent, 1);
    }

    #[tokio::test]
    async fn test_concurrent_sends_are_capped() {
        let mut config = fixture::config();
        config.dispatch.max_in_flight = 2;
        let relay = relay_with(config, RecordingNotifier::with_delay(Duration::from_millis(20)));

        let mut hits = Vec::new();
        for i in 0..6 {
            let name = format!("n{}", i);
            relay.deriver.set(&identity_id(&name), EphemeralId(500 + i));
            relay.register(&name, &format!("T-{}", i)).await;
            hits.push(hit(500 + i));
        }
        relay.connect().await;

        relay.network.push_hits(hits);
        let report = relay.services.scheduler().poll_once().await.unwrap();

        assert_eq!(report.sent, 6);
        assert!(relay.notifier.peak_in_flight() <= 2);
    }

    #[tokio::test]
    async fn test_malformed_hit_is_skipped() {
        let relay = relay();
        relay.register("a", "T1").await;
        relay.connect().await;

        relay.network.push_hits(vec![
            Hit::new("not-a-number", NotificationData::default()),
            hit(DEFAULT_EPHEMERAL.0),
        ]);
        let report = relay.services.scheduler().poll_once().await.unwrap();

        assert_eq!(report.malformed, 1);
        assert_eq!(report.sent, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_and_rotate_keep_one_binding_per_epoch() {
        let relay = Arc::new(relay());
        for i in 0..4 {
            relay.register(&format!("early{}", i), &format!("T-e{}", i)).await;
        }
        relay.clock.advance(Duration::from_secs(60));

        let mut tasks = Vec::new();
        for i in 0..12 {
            let relay = Arc::clone(&relay);
            tasks.push(tokio::spawn(async move {
                let name = format!("n{}", i);
                relay.register(&name, &format!("T-{}", i)).await;
                relay.register(&name, &format!("T-{}-again", i)).await;
            }));
        }
        for _ in 0..3 {
            let relay = Arc::clone(&relay);
            tasks.push(tokio::spawn(async move {
                relay.services.rotation.rotate_due().await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        relay.services.rotation.rotate_due().await.unwrap();

        assert_eq!(relay.registrations.len(), 16);
        let bindings = relay.bindings.snapshot();
        let mut keys = HashSet::new();
        for binding in &bindings {
            assert!(
                keys.insert((binding.identity_hash, binding.epoch)),
                "duplicate binding for {:?}",
                binding.epoch
            );
        }

        let now = relay.clock.now();
        let registrations = relay
            .services
            .registration
            .list_all_registrations()
            .await
            .unwrap();
        for registration in registrations {
            let epoch = relay
                .services
                .schedule
                .epoch_at(registration.offset_bucket, now);
            assert!(keys.contains(&(registration.identity_hash, epoch)));
        }
    }
}
