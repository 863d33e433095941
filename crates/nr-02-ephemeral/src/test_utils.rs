//! Test utilities for ephemeral rotation.
//!
//! Deterministic stand-ins for the clock and the derivation backend.
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```ignore
//! use nr_02_ephemeral::test_utils::ManualClock;
//! use nr_02_ephemeral::TimeSource;
//! use shared_types::Timestamp;
//! use std::time::Duration;
//!
//! let clock = ManualClock::new(Timestamp::from_secs(100));
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now(), Timestamp::from_secs(105));
//! ```

use crate::domain::{DerivationError, DerivedEphemeral};
use crate::ports::{EphemeralIdDeriver, TimeSource};
use parking_lot::Mutex;
use shared_types::{EphemeralId, Timestamp};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    /// Clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            nanos: AtomicI64::new(start.as_nanos()),
        }
    }

    /// Jump to `at`.
    pub fn set(&self, at: Timestamp) {
        self.nanos.store(at.as_nanos(), Ordering::SeqCst);
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_nanos()).unwrap_or(i64::MAX);
        self.nanos.fetch_add(delta, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Deriver returning scripted IDs.
///
/// Identities without a scripted ID get `default_id`. Identities marked
/// failing return [`DerivationError::Backend`].
#[derive(Debug)]
pub struct StubEphemeralDeriver {
    ids: Mutex<HashMap<Vec<u8>, EphemeralId>>,
    failing: Mutex<HashSet<Vec<u8>>>,
    default_id: EphemeralId,
    calls: AtomicI64,
}

impl StubEphemeralDeriver {
    /// Stub answering `default_id` for every identity.
    pub fn new(default_id: EphemeralId) -> Self {
        Self {
            ids: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            default_id,
            calls: AtomicI64::new(0),
        }
    }

    /// Script the ID returned for `identity_id`.
    pub fn set(&self, identity_id: &[u8], id: EphemeralId) {
        self.ids.lock().insert(identity_id.to_vec(), id);
    }

    /// Make derivation fail for `identity_id`.
    pub fn fail_for(&self, identity_id: &[u8]) {
        self.failing.lock().insert(identity_id.to_vec());
    }

    /// Stop failing for `identity_id`.
    pub fn heal(&self, identity_id: &[u8]) {
        self.failing.lock().remove(identity_id);
    }

    /// Number of derive calls so far.
    pub fn calls(&self) -> i64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EphemeralIdDeriver for StubEphemeralDeriver {
    fn derive(
        &self,
        identity_id: &[u8],
        _address_space_size: u8,
        now: Timestamp,
    ) -> Result<DerivedEphemeral, DerivationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(identity_id) {
            return Err(DerivationError::Backend("scripted failure".to_string()));
        }
        let id = self
            .ids
            .lock()
            .get(identity_id)
            .copied()
            .unwrap_or(self.default_id);
        Ok(DerivedEphemeral {
            ephemeral_id: id,
            valid_from: now,
            valid_to: now.plus_nanos(1),
        })
    }
}
