//! # Inbound Ports
//!
//! What remote devices can ask of the Registration subsystem.

use crate::domain::{AuthContext, RegistrationError};
use async_trait::async_trait;
use shared_types::Registration;

/// Registration API - inbound port.
///
/// The transport authenticates the caller and hands the result over in
/// [`AuthContext`]. Both operations refuse to act for unauthenticated
/// callers.
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    /// Record (or replace) the push token for the caller's identity.
    ///
    /// Returns the persisted row.
    async fn register_for_notifications(
        &self,
        token: &[u8],
        auth: &AuthContext,
    ) -> Result<Registration, RegistrationError>;

    /// Remove the caller's registration.
    ///
    /// Fails with [`RegistrationError::NotFound`] if the identity was never
    /// registered.
    async fn unregister_for_notifications(
        &self,
        auth: &AuthContext,
    ) -> Result<(), RegistrationError>;
}
