//! Poll loop.

use crate::domain::{
    SchedulerConfig, SchedulerError, SchedulerExit, SchedulerState, SchedulerStatus,
};
use crate::ports::TopologyApi;
use nr_03_dispatcher::{DispatchApi, DispatchReport, Hit};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Periodically polls the network and dispatches hits.
pub struct PollScheduler {
    topology: Arc<dyn TopologyApi>,
    dispatcher: Arc<dyn DispatchApi>,
    config: SchedulerConfig,
}

/// Controls a running [`PollScheduler`] task.
pub struct PollSchedulerHandle {
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<SchedulerStatus>,
    fatal: Option<oneshot::Receiver<SchedulerError>>,
    task: JoinHandle<SchedulerExit>,
}

impl PollScheduler {
    /// Create a scheduler.
    pub fn new(
        topology: Arc<dyn TopologyApi>,
        dispatcher: Arc<dyn DispatchApi>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            topology,
            dispatcher,
            config,
        }
    }

    /// Run one cycle against the current topology snapshot.
    pub async fn poll_once(&self) -> Result<DispatchReport, SchedulerError> {
        let hits = self.fetch_hits().await?;
        Ok(self.dispatcher.dispatch(hits).await)
    }

    async fn fetch_hits(&self) -> Result<Vec<Hit>, SchedulerError> {
        let active = self
            .topology
            .current_topology()
            .ok_or(SchedulerError::NoTopology)?;
        let hits = active.client.request_hit_list(&active.poll_host).await?;
        debug!(hits = hits.len(), host = %active.poll_host.id, "[nr-04] Hit list received");
        Ok(hits)
    }

    /// Start the loop on the current tokio runtime.
    pub fn spawn(self) -> PollSchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(SchedulerStatus::default());
        let (fatal_tx, fatal_rx) = oneshot::channel();

        let task = tokio::spawn(self.run(shutdown_rx, status_tx, fatal_tx));
        PollSchedulerHandle {
            shutdown: shutdown_tx,
            status: status_rx,
            fatal: Some(fatal_rx),
            task,
        }
    }

    async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
        status: watch::Sender<SchedulerStatus>,
        fatal: oneshot::Sender<SchedulerError>,
    ) -> SchedulerExit {
        let threshold = self.config.failure_threshold.max(1);
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            interval_ms = self.config.poll_interval.as_millis() as u64,
            threshold = threshold,
            "[nr-04] Poll scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        set_state(&status, SchedulerState::Stopped);
                        info!("[nr-04] Poll scheduler stopped");
                        return SchedulerExit::Stopped;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            set_state(&status, SchedulerState::Polling);
            match self.fetch_hits().await {
                Ok(hits) => {
                    status.send_modify(|s| {
                        s.state = SchedulerState::Dispatching;
                        s.consecutive_failures = 0;
                        s.polls_completed += 1;
                        s.last_error = None;
                    });
                    if !hits.is_empty() {
                        self.dispatcher.dispatch(hits).await;
                    }
                    set_state(&status, SchedulerState::Idle);
                }
                Err(e) => {
                    let mut failures = 0;
                    status.send_modify(|s| {
                        s.state = SchedulerState::Backoff;
                        s.consecutive_failures += 1;
                        s.last_error = Some(e.to_string());
                        failures = s.consecutive_failures;
                    });

                    if failures >= threshold {
                        let fatal_error = SchedulerError::ThresholdReached {
                            failures,
                            last_error: e.to_string(),
                        };
                        error!(error = %fatal_error, "[nr-04] Poll scheduler giving up");
                        set_state(&status, SchedulerState::Failed);
                        // Receiver may already be gone; the exit value still carries it.
                        let _ = fatal.send(fatal_error.clone());
                        return SchedulerExit::Fatal(fatal_error);
                    }
                    warn!(
                        error = %e,
                        failures = failures,
                        threshold = threshold,
                        "[nr-04] Poll cycle failed"
                    );
                }
            }
        }
    }
}

fn set_state(status: &watch::Sender<SchedulerStatus>, state: SchedulerState) {
    status.send_modify(|s| s.state = state);
}

impl PollSchedulerHandle {
    /// Ask the loop to stop. Returns immediately.
    pub fn stop(&self) {
        // Loop already exited if nobody is listening.
        let _ = self.shutdown.send(true);
    }

    /// Latest status snapshot.
    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    /// Receiver that follows every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    /// Take the fatal channel. Resolves at most once, only if the failure
    /// threshold is reached. Returns `None` after the first call.
    pub fn take_fatal(&mut self) -> Option<oneshot::Receiver<SchedulerError>> {
        self.fatal.take()
    }

    /// Wait for the loop to end.
    pub async fn wait(self) -> SchedulerExit {
        match self.task.await {
            Ok(exit) => exit,
            Err(e) => SchedulerExit::Fatal(SchedulerError::Aborted(e.to_string())),
        }
    }

    /// Stop and wait.
    pub async fn shutdown(self) -> SchedulerExit {
        self.stop();
        self.wait().await
    }
}
