//! Fully wired relay with deterministic doubles at every outbound port.

use nr_01_registration::{
    AuthContext, Ed25519IdentityVerifier, IdentityClaim, InMemoryRegistrationRepository,
    RegistrationApi,
};
use nr_02_ephemeral::test_utils::{ManualClock, StubEphemeralDeriver};
use nr_02_ephemeral::InMemoryEphemeralRepository;
use nr_03_dispatcher::test_utils::RecordingNotifier;
use nr_04_poll_scheduler::test_utils::{single_host_topology, ScriptedNetworkClient};
use nr_04_poll_scheduler::TopologyApi;
use relay_runtime::{RelayAdapters, RelayConfig, RelayServices};
use shared_types::{EphemeralId, Registration, Timestamp};
use std::sync::Arc;
use std::time::Duration;

/// ID the stub deriver hands out unless told otherwise.
pub const DEFAULT_EPHEMERAL: EphemeralId = EphemeralId(7);

pub struct Relay {
    pub services: RelayServices,
    pub registrations: Arc<InMemoryRegistrationRepository>,
    pub bindings: Arc<InMemoryEphemeralRepository>,
    pub deriver: Arc<StubEphemeralDeriver>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub network: Arc<ScriptedNetworkClient>,
}

pub fn config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.network.poll_interval = Duration::from_millis(10);
    config.network.failure_threshold = 3;
    config.epochs.epoch_length = Duration::from_secs(60);
    config.epochs.bucket_count = 4;
    config.epochs.retained_epochs = 2;
    config.dispatch.max_in_flight = 4;
    config
}

pub fn relay() -> Relay {
    relay_with(config(), RecordingNotifier::new())
}

pub fn relay_with(config: RelayConfig, notifier: RecordingNotifier) -> Relay {
    let registrations = Arc::new(InMemoryRegistrationRepository::new());
    let bindings = Arc::new(InMemoryEphemeralRepository::new());
    let deriver = Arc::new(StubEphemeralDeriver::new(DEFAULT_EPHEMERAL));
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_000_000)));
    let notifier = Arc::new(notifier);
    let network = Arc::new(ScriptedNetworkClient::new());

    let adapters = RelayAdapters {
        registrations: registrations.clone(),
        bindings: bindings.clone(),
        deriver: deriver.clone(),
        clock: clock.clone(),
        notifier: notifier.clone(),
        network: network.clone(),
        verifier: Arc::new(Ed25519IdentityVerifier),
    };
    let services = RelayServices::new(config, adapters).unwrap();

    Relay {
        services,
        registrations,
        bindings,
        deriver,
        clock,
        notifier,
        network,
    }
}

impl Relay {
    /// Register `name` with `token`, authenticated by the transport.
    pub async fn register(&self, name: &str, token: &str) -> Registration {
        self.services
            .registration
            .register_for_notifications(token.as_bytes(), &auth(name))
            .await
            .unwrap()
    }

    /// Activate a single-host topology.
    pub async fn connect(&self) {
        self.services
            .topology
            .update_topology(single_host_topology("gw1"))
            .await
            .unwrap();
    }
}

pub fn identity_id(name: &str) -> Vec<u8> {
    format!("iid-{}", name).into_bytes()
}

pub fn auth(name: &str) -> AuthContext {
    AuthContext::authenticated(IdentityClaim::new(
        identity_id(name),
        format!("pk-{}", name).into_bytes(),
        vec![],
    ))
}
