//! # Scheduler State

use super::errors::SchedulerError;
use std::time::Duration;

/// Poll loop state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// Requesting the hit list.
    Polling,
    /// Handing hits to the dispatcher.
    Dispatching,
    /// Last cycle failed; waiting for the next tick.
    Backoff,
    /// Stopped on request.
    Stopped,
    /// Gave up after too many failures.
    Failed,
}

impl SchedulerState {
    /// Check if transition to next state is valid.
    pub fn can_transition_to(&self, next: SchedulerState) -> bool {
        match (self, next) {
            (Self::Idle, Self::Polling) => true,
            (Self::Polling, Self::Dispatching) => true,
            (Self::Polling, Self::Backoff) => true,
            (Self::Dispatching, Self::Idle) => true,
            (Self::Backoff, Self::Polling) => true,
            (Self::Backoff, Self::Failed) => true,
            (Self::Idle | Self::Backoff, Self::Stopped) => true,
            _ => false,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

/// Snapshot published after every state change.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SchedulerStatus {
    /// Current state.
    pub state: SchedulerState,
    /// Failed cycles since the last success.
    pub consecutive_failures: u32,
    /// Successful polls since start.
    pub polls_completed: u64,
    /// Error of the most recent failed cycle.
    pub last_error: Option<String>,
}

/// How the loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerExit {
    /// Stop was requested.
    Stopped,
    /// The failure threshold was reached or the task aborted.
    Fatal(SchedulerError),
}

/// Scheduler tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between poll cycles.
    pub poll_interval: Duration,
    /// Consecutive failures that end the loop. Zero is treated as one.
    pub failure_threshold: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            failure_threshold: 10,
        }
    }
}
