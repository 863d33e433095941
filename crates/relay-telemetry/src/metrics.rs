//! Prometheus metrics for the notification relay.
//!
//! All metrics follow the naming convention: `nr_<subsystem>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // REGISTRATION METRICS (Subsystem 1)
    // =========================================================================

    /// Registration RPCs by operation and outcome
    pub static ref REGISTRATION_OPS: IntCounterVec = IntCounterVec::new(
        Opts::new("nr_registration_operations_total", "Registration RPCs handled"),
        &["op", "outcome"]  // op: register/unregister, outcome: ok/auth/malformed/not_found/storage
    ).expect("metric creation failed");

    // =========================================================================
    // ROTATION METRICS (Subsystem 2)
    // =========================================================================

    /// Ephemeral bindings written
    pub static ref BINDINGS_WRITTEN: IntCounter = IntCounter::new(
        "nr_rotation_bindings_written_total",
        "Ephemeral bindings written by rotation"
    ).expect("metric creation failed");

    /// Ephemeral bindings removed by the epoch sweep
    pub static ref BINDINGS_PURGED: IntCounter = IntCounter::new(
        "nr_rotation_bindings_purged_total",
        "Ephemeral bindings deleted by the epoch sweep"
    ).expect("metric creation failed");

    /// Rotation failures by kind
    pub static ref ROTATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("nr_rotation_failures_total", "Rotation failures"),
        &["kind"]  // kind: derivation/storage
    ).expect("metric creation failed");

    // =========================================================================
    // DISPATCH METRICS (Subsystem 3)
    // =========================================================================

    /// Hits received from the network
    pub static ref HITS_RECEIVED: IntCounter = IntCounter::new(
        "nr_dispatch_hits_total",
        "Hits received from the network"
    ).expect("metric creation failed");

    /// Hits or matches that produced no send
    pub static ref DISPATCH_SKIPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("nr_dispatch_skipped_total", "Hits or matches that produced no send"),
        &["reason"]  // reason: malformed/unresolved/orphaned/lookup_error/duplicate
    ).expect("metric creation failed");

    /// Notifications accepted by the push backend
    pub static ref NOTIFICATIONS_SENT: IntCounter = IntCounter::new(
        "nr_dispatch_notifications_sent_total",
        "Notifications accepted by the push backend"
    ).expect("metric creation failed");

    /// Notifications refused by the push backend
    pub static ref NOTIFICATIONS_FAILED: IntCounter = IntCounter::new(
        "nr_dispatch_notifications_failed_total",
        "Notifications refused by the push backend"
    ).expect("metric creation failed");

    /// Batch dispatch duration
    pub static ref DISPATCH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "nr_dispatch_batch_duration_seconds",
            "Time spent dispatching one batch of hits"
        ).buckets(exponential_buckets(0.001, 2.0, 14).expect("valid bucket layout"))
    ).expect("metric creation failed");

    // =========================================================================
    // POLL METRICS (Subsystem 4)
    // =========================================================================

    /// Poll cycles by outcome
    pub static ref POLL_CYCLES: IntCounterVec = IntCounterVec::new(
        Opts::new("nr_poll_cycles_total", "Poll cycles"),
        &["outcome"]  // outcome: success/failure
    ).expect("metric creation failed");
}

/// Handle for the metrics registry
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Registration
        Box::new(REGISTRATION_OPS.clone()),
        // Rotation
        Box::new(BINDINGS_WRITTEN.clone()),
        Box::new(BINDINGS_PURGED.clone()),
        Box::new(ROTATION_FAILURES.clone()),
        // Dispatch
        Box::new(HITS_RECEIVED.clone()),
        Box::new(DISPATCH_SKIPPED.clone()),
        Box::new(NOTIFICATIONS_SENT.clone()),
        Box::new(NOTIFICATIONS_FAILED.clone()),
        Box::new(DISPATCH_DURATION.clone()),
        // Poll
        Box::new(POLL_CYCLES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
