//! Rotation manager.

use crate::domain::{RotationError, RotationFailure, RotationReport};
use crate::ports::{EphemeralBindingRepository, EphemeralIdDeriver, RotationApi, TimeSource};
use async_trait::async_trait;
use nr_01_registration::{ObserverError, RegistrationObserver, RegistrationRepository};
use parking_lot::Mutex;
use shared_types::{
    EphemeralBinding, Epoch, EpochSchedule, IdentityHash, OffsetBucket, Registration, Timestamp,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
struct RotationState {
    /// Last epoch fully written per bucket.
    rotated: HashMap<OffsetBucket, Epoch>,
    /// Identities whose derivation failed and must be retried.
    retry: HashSet<IdentityHash>,
}

/// Keeps current-epoch bindings for every registration.
///
/// Only this type writes to the bucket store.
pub struct RotationManager {
    registrations: Arc<dyn RegistrationRepository>,
    bindings: Arc<dyn EphemeralBindingRepository>,
    deriver: Arc<dyn EphemeralIdDeriver>,
    clock: Arc<dyn TimeSource>,
    schedule: EpochSchedule,
    state: Mutex<RotationState>,
}

impl RotationManager {
    /// Create a manager.
    pub fn new(
        registrations: Arc<dyn RegistrationRepository>,
        bindings: Arc<dyn EphemeralBindingRepository>,
        deriver: Arc<dyn EphemeralIdDeriver>,
        clock: Arc<dyn TimeSource>,
        schedule: EpochSchedule,
    ) -> Self {
        Self {
            registrations,
            bindings,
            deriver,
            clock,
            schedule,
            state: Mutex::new(RotationState::default()),
        }
    }

    /// Schedule this manager rotates on.
    pub fn schedule(&self) -> &EpochSchedule {
        &self.schedule
    }

    /// Last epoch written for `bucket`, if any.
    pub fn last_rotated(&self, bucket: OffsetBucket) -> Option<Epoch> {
        self.state.lock().rotated.get(&bucket).copied()
    }

    /// Identities queued for retry.
    pub fn pending_retries(&self) -> usize {
        self.state.lock().retry.len()
    }

    fn binding_for(
        &self,
        registration: &Registration,
        now: Timestamp,
    ) -> Result<EphemeralBinding, RotationFailure> {
        let derived = self
            .deriver
            .derive(
                &registration.identity_id,
                self.schedule.address_space_size(),
                now,
            )
            .map_err(|error| RotationFailure {
                identity_hash: registration.identity_hash,
                error,
            })?;
        Ok(EphemeralBinding {
            identity_hash: registration.identity_hash,
            ephemeral_id: derived.ephemeral_id,
            epoch: self.schedule.epoch_at(registration.offset_bucket, now),
            offset_bucket: registration.offset_bucket,
        })
    }
}

#[async_trait]
impl RotationApi for RotationManager {
    async fn rotate_due(&self) -> Result<RotationReport, RotationError> {
        let now = self.clock.now();
        let registrations = self.registrations.list_all().await?;

        let mut buckets: BTreeMap<OffsetBucket, Vec<Registration>> = BTreeMap::new();
        for registration in registrations {
            buckets
                .entry(registration.offset_bucket)
                .or_default()
                .push(registration);
        }

        let (rotated, retry) = {
            let mut state = self.state.lock();
            // Unregistered identities never come back through list_all.
            let live: HashSet<IdentityHash> = buckets
                .values()
                .flatten()
                .map(|r| r.identity_hash)
                .collect();
            state.retry.retain(|h| live.contains(h));
            (state.rotated.clone(), state.retry.clone())
        };

        let mut report = RotationReport::default();
        for (bucket, members) in buckets {
            let epoch = self.schedule.epoch_at(bucket, now);
            let due = rotated.get(&bucket) != Some(&epoch);
            let targets: Vec<&Registration> = members
                .iter()
                .filter(|r| due || retry.contains(&r.identity_hash))
                .collect();
            if targets.is_empty() {
                continue;
            }

            let mut batch = Vec::with_capacity(targets.len());
            let mut failures = Vec::new();
            for registration in targets {
                match self.binding_for(registration, now) {
                    Ok(binding) => batch.push(binding),
                    Err(failure) => {
                        warn!(
                            identity = %failure.identity_hash.short(),
                            bucket = %bucket,
                            error = %failure.error,
                            "[nr-02] Ephemeral derivation failed"
                        );
                        failures.push(failure);
                    }
                }
            }

            let written_hashes: Vec<IdentityHash> =
                batch.iter().map(|b| b.identity_hash).collect();
            let written = self.bindings.upsert_many(batch).await?;

            {
                let mut state = self.state.lock();
                if due {
                    state.rotated.insert(bucket, epoch);
                }
                for hash in &written_hashes {
                    state.retry.remove(hash);
                }
                for failure in &failures {
                    state.retry.insert(failure.identity_hash);
                }
            }

            if due {
                report.buckets_rotated += 1;
                debug!(
                    bucket = %bucket,
                    epoch = %epoch,
                    written = written,
                    "[nr-02] Bucket rotated"
                );
            }
            report.bindings_written += written;
            report.failures.extend(failures);
        }

        if !report.is_empty() {
            info!(
                buckets = report.buckets_rotated,
                written = report.bindings_written,
                failed = report.failures.len(),
                "[nr-02] Rotation cycle complete"
            );
        }
        Ok(report)
    }

    async fn bind_current(
        &self,
        registration: &Registration,
    ) -> Result<EphemeralBinding, RotationError> {
        let now = self.clock.now();
        let binding = match self.binding_for(registration, now) {
            Ok(binding) => binding,
            Err(failure) => {
                self.state.lock().retry.insert(registration.identity_hash);
                return Err(failure.error.into());
            }
        };
        self.bindings.upsert_many(vec![binding.clone()]).await?;
        debug!(
            identity = %binding.identity_hash.short(),
            epoch = %binding.epoch,
            "[nr-02] Bound current epoch"
        );
        Ok(binding)
    }

    async fn purge_epochs_below(&self, floor: Epoch) -> Result<usize, RotationError> {
        let removed = self.bindings.purge_epochs_below(floor).await?;
        if removed > 0 {
            debug!(floor = %floor, removed = removed, "[nr-02] Purged expired bindings");
        }
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize, RotationError> {
        let floor = self.schedule.retention_floor(self.clock.now());
        self.purge_epochs_below(floor).await
    }
}

#[async_trait]
impl RegistrationObserver for RotationManager {
    async fn on_registered(&self, registration: &Registration) -> Result<(), ObserverError> {
        self.bind_current(registration)
            .await
            .map(|_| ())
            .map_err(|e| ObserverError(e.to_string()))
    }
}
