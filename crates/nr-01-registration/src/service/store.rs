//! Store operations shared by the RPC surface and the rest of the relay.

use crate::domain::RegistrationError;
use crate::ports::{RegistrationObserver, RegistrationRepository};
use shared_types::{EpochSchedule, IdentityHash, Registration};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registration service.
///
/// Thin layer over a [`RegistrationRepository`] that fills in derived fields
/// (identity hash, offset bucket) and notifies an optional observer.
pub struct RegistrationService {
    pub(crate) repository: Arc<dyn RegistrationRepository>,
    pub(crate) schedule: EpochSchedule,
    pub(crate) observer: Option<Arc<dyn RegistrationObserver>>,
}

impl RegistrationService {
    /// Create a service over `repository`.
    pub fn new(repository: Arc<dyn RegistrationRepository>, schedule: EpochSchedule) -> Self {
        Self {
            repository,
            schedule,
            observer: None,
        }
    }

    /// Attach an observer that runs after every successful registration.
    pub fn with_observer(mut self, observer: Arc<dyn RegistrationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Backing repository.
    pub fn repository(&self) -> Arc<dyn RegistrationRepository> {
        Arc::clone(&self.repository)
    }

    /// Insert or update the registration for `public_key`.
    ///
    /// Calling this twice with the same inputs leaves one row; calling it
    /// with a new token replaces only the token.
    pub async fn upsert_registration(
        &self,
        identity_id: &[u8],
        public_key: &[u8],
        signature: &[u8],
        push_token: &str,
    ) -> Result<Registration, RegistrationError> {
        let identity_hash = IdentityHash::of_public_key(public_key);
        let candidate = Registration {
            identity_hash,
            identity_id: identity_id.to_vec(),
            public_key: public_key.to_vec(),
            signature: signature.to_vec(),
            offset_bucket: self.schedule.offset_bucket(identity_id),
            push_token: push_token.to_string(),
        };

        let stored = self.repository.upsert(candidate).await?;
        debug!(
            identity = %stored.identity_hash.short(),
            bucket = %stored.offset_bucket,
            token = %stored.redacted_token(),
            "[nr-01] Registration upserted"
        );
        Ok(stored)
    }

    /// Fetch a registration by identity hash.
    pub async fn get_registration(
        &self,
        identity_hash: &IdentityHash,
    ) -> Result<Registration, RegistrationError> {
        self.repository
            .get(identity_hash)
            .await?
            .ok_or(RegistrationError::NotFound(*identity_hash))
    }

    /// Remove a registration.
    pub async fn delete_registration(
        &self,
        identity_hash: &IdentityHash,
    ) -> Result<(), RegistrationError> {
        if !self.repository.delete(identity_hash).await? {
            return Err(RegistrationError::NotFound(*identity_hash));
        }
        info!(identity = %identity_hash.short(), "[nr-01] Registration deleted");
        Ok(())
    }

    /// Every registration, ordered by identity hash.
    pub async fn list_all_registrations(&self) -> Result<Vec<Registration>, RegistrationError> {
        Ok(self.repository.list_all().await?)
    }

    pub(crate) async fn notify_observer(&self, registration: &Registration) {
        let Some(observer) = &self.observer else {
            return;
        };
        if let Err(e) = observer.on_registered(registration).await {
            warn!(
                identity = %registration.identity_hash.short(),
                error = %e,
                "[nr-01] Registration stored but observer failed"
            );
        }
    }
}
