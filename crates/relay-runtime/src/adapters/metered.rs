//! # Metered Adapters
//!
//! Decorators that record Prometheus counters around the subsystem ports.
//! Each one forwards every call unchanged.

use async_trait::async_trait;
use nr_01_registration::{ObserverError, RegistrationObserver};
use nr_02_ephemeral::{RotationApi, RotationError, RotationReport};
use nr_03_dispatcher::{DispatchApi, DispatchReport, Hit};
use nr_04_poll_scheduler::{
    HostHandle, HostOptions, NetworkClient, NetworkError, NetworkHost, Topology,
};
use relay_telemetry::{
    metric_add, metric_inc, HistogramTimer, BINDINGS_PURGED, BINDINGS_WRITTEN, DISPATCH_DURATION,
    DISPATCH_SKIPPED, HITS_RECEIVED, NOTIFICATIONS_FAILED, NOTIFICATIONS_SENT, POLL_CYCLES,
    ROTATION_FAILURES,
};
use shared_types::{EphemeralBinding, Epoch, Registration};
use std::sync::Arc;

fn record_rotation_error(error: &RotationError) {
    let kind = match error {
        RotationError::Storage(_) => "storage",
        RotationError::Derivation(_) => "derivation",
    };
    metric_inc!(ROTATION_FAILURES, &[kind]);
}

/// [`RotationApi`] that counts written and purged bindings.
pub struct MeteredRotation {
    inner: Arc<dyn RotationApi>,
}

impl MeteredRotation {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn RotationApi>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RotationApi for MeteredRotation {
    async fn rotate_due(&self) -> Result<RotationReport, RotationError> {
        let result = self.inner.rotate_due().await;
        match &result {
            Ok(report) => {
                metric_add!(BINDINGS_WRITTEN, report.bindings_written);
                if !report.failures.is_empty() {
                    metric_add!(ROTATION_FAILURES, &["derivation"], report.failures.len());
                }
            }
            Err(e) => record_rotation_error(e),
        }
        result
    }

    async fn bind_current(
        &self,
        registration: &Registration,
    ) -> Result<EphemeralBinding, RotationError> {
        let result = self.inner.bind_current(registration).await;
        match &result {
            Ok(_) => metric_inc!(BINDINGS_WRITTEN),
            Err(e) => record_rotation_error(e),
        }
        result
    }

    async fn purge_epochs_below(&self, floor: Epoch) -> Result<usize, RotationError> {
        let removed = self.inner.purge_epochs_below(floor).await?;
        metric_add!(BINDINGS_PURGED, removed);
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize, RotationError> {
        let removed = self.inner.purge_expired().await?;
        metric_add!(BINDINGS_PURGED, removed);
        Ok(removed)
    }
}

#[async_trait]
impl RegistrationObserver for MeteredRotation {
    async fn on_registered(&self, registration: &Registration) -> Result<(), ObserverError> {
        self.bind_current(registration)
            .await
            .map(|_| ())
            .map_err(|e| ObserverError(e.to_string()))
    }
}

/// [`DispatchApi`] that records batch outcomes and duration.
pub struct MeteredDispatcher {
    inner: Arc<dyn DispatchApi>,
}

impl MeteredDispatcher {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn DispatchApi>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DispatchApi for MeteredDispatcher {
    async fn dispatch(&self, hits: Vec<Hit>) -> DispatchReport {
        let _timer = HistogramTimer::new(&DISPATCH_DURATION);
        let report = self.inner.dispatch(hits).await;

        metric_add!(HITS_RECEIVED, report.hits);
        metric_add!(NOTIFICATIONS_SENT, report.sent);
        metric_add!(NOTIFICATIONS_FAILED, report.failed.len());
        for (reason, count) in [
            ("malformed", report.malformed),
            ("unresolved", report.unresolved),
            ("orphaned", report.orphaned),
            ("lookup_error", report.lookup_errors),
            ("duplicate", report.duplicates),
        ] {
            if count > 0 {
                metric_add!(DISPATCH_SKIPPED, &[reason], count);
            }
        }
        report
    }
}

/// [`NetworkClient`] that counts hit-list requests by outcome.
pub struct MeteredNetworkClient {
    inner: Arc<dyn NetworkClient>,
}

impl MeteredNetworkClient {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn NetworkClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl NetworkClient for MeteredNetworkClient {
    async fn request_hit_list(&self, host: &HostHandle) -> Result<Vec<Hit>, NetworkError> {
        let result = self.inner.request_hit_list(host).await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        metric_inc!(POLL_CYCLES, &[outcome]);
        result
    }

    async fn fetch_topology(&self, host: &HostHandle) -> Result<Topology, NetworkError> {
        self.inner.fetch_topology(host).await
    }

    async fn register_host(
        &self,
        host: &NetworkHost,
        options: &HostOptions,
    ) -> Result<HostHandle, NetworkError> {
        self.inner.register_host(host, options).await
    }
}
