//! # Domain Errors

use thiserror::Error;

/// Network client failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// Host could not be reached.
    #[error("Host unreachable: {0}")]
    Unreachable(String),

    /// Host did not answer in time.
    #[error("Request timed out")]
    Timeout,

    /// Host answered with something we could not decode.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Host refused the request.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Topology update failures. The previous topology stays active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// Topology lists no hosts.
    #[error("Topology has no hosts")]
    NoHosts,

    /// Designated poll host is not among the listed hosts.
    #[error("Poll host {0} is not part of the topology")]
    UnknownPollHost(String),

    /// Two hosts share an id.
    #[error("Duplicate host id {0}")]
    DuplicateHost(String),

    /// `refresh` was called before any topology was loaded.
    #[error("No topology loaded")]
    NotLoaded,

    /// Registering or fetching through the network client failed.
    #[error("Network failure: {0}")]
    Network(#[from] NetworkError),
}

/// Poll cycle and loop failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// No topology has been loaded yet.
    #[error("No topology available")]
    NoTopology,

    /// Polling the host failed.
    #[error("Poll failed: {0}")]
    Network(#[from] NetworkError),

    /// Consecutive failures reached the configured threshold.
    #[error("Giving up after {failures} consecutive poll failures (last: {last_error})")]
    ThresholdReached {
        /// Failures counted when the loop gave up.
        failures: u32,
        /// Error of the final failed cycle.
        last_error: String,
    },

    /// The loop task ended abnormally.
    #[error("Scheduler task aborted: {0}")]
    Aborted(String),
}
