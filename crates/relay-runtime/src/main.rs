//! # Notify-Relay Runtime
//!
//! The main entry point for the notification relay bot.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults plus `NR_*` environment overrides)
//! 2. Install logging and register metrics
//! 3. Build adapters and wire the subsystems
//! 4. Load the initial topology (if `NR_TOPOLOGY_PATH` is set)
//! 5. Spawn rotation, topology refresh, the poll scheduler and the API
//! 6. Run until Ctrl+C or a fatal scheduler error
//!
//! A fatal scheduler error exits with a non-zero status.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use nr_02_ephemeral::rotation_task;
use nr_04_poll_scheduler::{
    topology_refresh_task, PollSchedulerHandle, SchedulerError, SchedulerExit, TopologyApi,
};
use relay_runtime::api::{self, ApiState};
use relay_runtime::{RelayAdapters, RelayConfig, RelayServices, VERSION};
use relay_telemetry::init_telemetry;

/// How long background tasks get to finish after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Why the runtime stopped.
enum Exit {
    Signal,
    Fatal(SchedulerError),
    ApiStopped(String),
}

/// The relay runtime orchestrating all subsystems.
struct RelayRuntime {
    services: Arc<RelayServices>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl RelayRuntime {
    fn new(services: RelayServices) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            services: Arc::new(services),
            shutdown_tx,
            shutdown_rx,
        }
    }

    async fn run(self) -> Result<()> {
        let config = &self.services.config;

        match &config.network.topology_path {
            Some(path) => {
                self.services
                    .load_topology(path)
                    .await
                    .context("Failed to load initial topology")?;
            }
            None => warn!(
                "[runtime] NR_TOPOLOGY_PATH not set; poll cycles fail until PUT /v1/topology"
            ),
        }

        let listener = TcpListener::bind(config.api.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.api.listen_addr))?;

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        tasks.push(tokio::spawn(rotation_task(
            self.services.rotation.clone(),
            config.epochs.rotation_interval,
            self.shutdown_rx.clone(),
        )));
        let topology: Arc<dyn TopologyApi> = self.services.topology.clone();
        tasks.push(tokio::spawn(topology_refresh_task(
            topology.clone(),
            config.network.topology_refresh,
            self.shutdown_rx.clone(),
        )));

        let mut scheduler = self.services.scheduler().spawn();
        let fatal = scheduler.take_fatal();

        let state = ApiState {
            registration: self.services.registration.clone(),
            verifier: self.services.verifier.clone(),
            topology,
            scheduler_status: Some(scheduler.subscribe_status()),
        };
        let mut api_task = tokio::spawn(api::serve(listener, state, self.shutdown_rx.clone()));

        info!(
            version = VERSION,
            api = %config.api.listen_addr,
            poll_interval_ms = config.network.poll_interval.as_millis() as u64,
            "[runtime] Relay running"
        );

        let exit = tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    error!(error = %e, "[runtime] Failed to listen for Ctrl+C");
                }
                Exit::Signal
            }
            Some(e) = wait_fatal(fatal) => Exit::Fatal(e),
            res = &mut api_task => Exit::ApiStopped(match res {
                Ok(Ok(())) => "server exited".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            }),
        };

        self.shutdown(scheduler, tasks, api_task).await;

        match exit {
            Exit::Signal => Ok(()),
            Exit::Fatal(e) => Err(anyhow!(e)).context("Poll scheduler gave up"),
            Exit::ApiStopped(reason) => Err(anyhow!(reason)).context("API server stopped"),
        }
    }

    /// Signal every task and wait for them, bounded by [`SHUTDOWN_GRACE`].
    async fn shutdown(
        &self,
        scheduler: PollSchedulerHandle,
        tasks: Vec<JoinHandle<()>>,
        api_task: JoinHandle<std::io::Result<()>>,
    ) {
        info!("[runtime] Initiating graceful shutdown...");

        // Nobody listening means every task already exited.
        let _ = self.shutdown_tx.send(true);

        let drain = async {
            if let SchedulerExit::Fatal(e) = scheduler.shutdown().await {
                warn!(error = %e, "[runtime] Scheduler ended with error");
            }
            for task in tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "[runtime] Background task panicked");
                }
            }
            if !api_task.is_finished() {
                let _ = api_task.await;
            }
        };

        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("[runtime] Shutdown grace period elapsed, exiting anyway");
        }
        info!("[runtime] Shutdown complete");
    }
}

/// Resolves with the scheduler's fatal error, or never if there is none.
async fn wait_fatal(fatal: Option<oneshot::Receiver<SchedulerError>>) -> Option<SchedulerError> {
    match fatal {
        Some(rx) => rx.await.ok(),
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RelayConfig::from_env().context("Failed to load configuration")?;
    let _telemetry = init_telemetry(&config.telemetry).context("Failed to initialize telemetry")?;
    config.validate().context("Invalid configuration")?;

    info!(version = VERSION, "[runtime] Starting notify-relay");

    let adapters = RelayAdapters::from_config(&config).context("Failed to build adapters")?;
    let services = RelayServices::new(config, adapters).context("Failed to wire services")?;

    RelayRuntime::new(services).run().await
}
