//! # Relay Telemetry
//!
//! Logging and metrics for the notification relay.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` registry with an `EnvFilter` and either a
//!   pretty or a JSON fmt layer
//! - **Metrics**: Prometheus counters in a crate-local registry, exported as
//!   text for `GET /metrics`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(&TelemetryConfig::from_env()).expect("telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NR_SERVICE_NAME` | `notify-relay` | Service name in log lines |
//! | `NR_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `NR_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `NR_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, BINDINGS_PURGED,
    BINDINGS_WRITTEN, DISPATCH_DURATION, DISPATCH_SKIPPED, HITS_RECEIVED, NOTIFICATIONS_FAILED,
    NOTIFICATIONS_SENT, POLL_CYCLES, REGISTRATION_OPS, ROTATION_FAILURES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Metric registration or encoding failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Install logging and register metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    init_logging(config)?;
    tracing::info!(service = %config.service_name, "Telemetry initialized");
    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Convenience macro for adding to a counter.
#[macro_export]
macro_rules! metric_add {
    ($metric:expr, $value:expr) => {
        $metric.inc_by($value as u64)
    };
    ($metric:expr, $labels:expr, $value:expr) => {
        $metric.with_label_values($labels).inc_by($value as u64)
    };
}
