//! Test utilities for the poll scheduler.
//!
//! Enable with the `test-utils` feature flag.

use crate::domain::{HostHandle, HostOptions, NetworkError, NetworkHost, Topology};
use crate::ports::NetworkClient;
use async_trait::async_trait;
use nr_03_dispatcher::Hit;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Network client answering from a script.
///
/// `request_hit_list` pops scripted responses in order and falls back to a
/// fixed response once the script is exhausted (an empty hit list unless
/// changed).
#[derive(Debug)]
pub struct ScriptedNetworkClient {
    script: Mutex<VecDeque<Result<Vec<Hit>, NetworkError>>>,
    fallback: Mutex<Result<Vec<Hit>, NetworkError>>,
    topology: Mutex<Option<Topology>>,
    refuse_registration: AtomicBool,
    registered: Mutex<Vec<String>>,
    polls: AtomicUsize,
}

impl Default for ScriptedNetworkClient {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(Vec::new())),
            topology: Mutex::new(None),
            refuse_registration: AtomicBool::new(false),
            registered: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedNetworkClient {
    /// Client answering empty hit lists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful poll.
    pub fn push_hits(&self, hits: Vec<Hit>) {
        self.script.lock().push_back(Ok(hits));
    }

    /// Queue a failed poll.
    pub fn push_error(&self, error: NetworkError) {
        self.script.lock().push_back(Err(error));
    }

    /// Response used once the script runs out.
    pub fn set_fallback(&self, response: Result<Vec<Hit>, NetworkError>) {
        *self.fallback.lock() = response;
    }

    /// Topology returned by `fetch_topology`.
    pub fn set_topology(&self, topology: Topology) {
        *self.topology.lock() = Some(topology);
    }

    /// Make `register_host` fail.
    pub fn refuse_registration(&self, refuse: bool) {
        self.refuse_registration.store(refuse, Ordering::SeqCst);
    }

    /// Number of `request_hit_list` calls.
    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Ids passed to `register_host`, in order.
    pub fn registered_hosts(&self) -> Vec<String> {
        self.registered.lock().clone()
    }
}

#[async_trait]
impl NetworkClient for ScriptedNetworkClient {
    async fn request_hit_list(&self, _host: &HostHandle) -> Result<Vec<Hit>, NetworkError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(response) => response,
            None => self.fallback.lock().clone(),
        }
    }

    async fn fetch_topology(&self, host: &HostHandle) -> Result<Topology, NetworkError> {
        self.topology
            .lock()
            .clone()
            .ok_or_else(|| NetworkError::Unreachable(host.address.clone()))
    }

    async fn register_host(
        &self,
        host: &NetworkHost,
        _options: &HostOptions,
    ) -> Result<HostHandle, NetworkError> {
        if self.refuse_registration.load(Ordering::SeqCst) {
            return Err(NetworkError::Rejected(host.id.clone()));
        }
        self.registered.lock().push(host.id.clone());
        Ok(HostHandle {
            id: host.id.clone(),
            address: host.address.clone(),
        })
    }
}

/// Single-host topology polling `id`.
pub fn single_host_topology(id: &str) -> Topology {
    Topology {
        hosts: vec![NetworkHost {
            id: id.to_string(),
            address: format!("https://{}.test", id),
            tls_certificate: None,
        }],
        poll_host: id.to_string(),
    }
}
