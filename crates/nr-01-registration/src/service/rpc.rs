//! [`RegistrationApi`] implementation.

use super::store::RegistrationService;
use crate::domain::{parse_token, AuthContext, RegistrationError};
use crate::ports::RegistrationApi;
use async_trait::async_trait;
use shared_types::Registration;
use tracing::{info, warn};

fn require_authenticated(auth: &AuthContext) -> Result<(), RegistrationError> {
    if !auth.is_authenticated {
        warn!(
            identity = %auth.claim.identity_hash().short(),
            "[nr-01] Rejected unauthenticated caller"
        );
        return Err(RegistrationError::AuthenticationFailed(
            "caller identity not authenticated".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl RegistrationApi for RegistrationService {
    async fn register_for_notifications(
        &self,
        token: &[u8],
        auth: &AuthContext,
    ) -> Result<Registration, RegistrationError> {
        require_authenticated(auth)?;
        auth.claim.validate()?;
        let token = parse_token(token)?;

        let registration = self
            .upsert_registration(
                &auth.claim.identity_id,
                &auth.claim.public_key,
                &auth.claim.signature,
                &token,
            )
            .await?;

        self.notify_observer(&registration).await;

        info!(
            identity = %registration.identity_hash.short(),
            token = %registration.redacted_token(),
            "[nr-01] Registered for notifications"
        );
        Ok(registration)
    }

    async fn unregister_for_notifications(
        &self,
        auth: &AuthContext,
    ) -> Result<(), RegistrationError> {
        require_authenticated(auth)?;
        if auth.claim.public_key.is_empty() {
            return Err(RegistrationError::MalformedInput(
                "public key is empty".to_string(),
            ));
        }
        self.delete_registration(&auth.claim.identity_hash()).await
    }
}
