//! # Inbound Ports
//!
//! Operations the runtime drives on the Rotation subsystem.

use crate::domain::{RotationError, RotationReport};
use async_trait::async_trait;
use shared_types::{EphemeralBinding, Epoch, Registration};

/// Rotation API - inbound port.
#[async_trait]
pub trait RotationApi: Send + Sync {
    /// Write bindings for every bucket whose epoch changed since the last
    /// cycle, and retry identities that failed before.
    async fn rotate_due(&self) -> Result<RotationReport, RotationError>;

    /// Write the current-epoch binding for one registration.
    async fn bind_current(
        &self,
        registration: &Registration,
    ) -> Result<EphemeralBinding, RotationError>;

    /// Delete every binding with `epoch < floor`. Returns rows removed.
    async fn purge_epochs_below(&self, floor: Epoch) -> Result<usize, RotationError>;

    /// Sweep with the floor computed from the schedule at the current time.
    async fn purge_expired(&self) -> Result<usize, RotationError>;
}
