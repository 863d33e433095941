//! Hit resolution and bounded fan-out.

use crate::domain::{DeliveryFailure, DispatchConfig, DispatchReport, Hit, PushPayload};
use crate::ports::{DispatchApi, Notifier};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use nr_01_registration::RegistrationRepository;
use nr_02_ephemeral::EphemeralBindingRepository;
use shared_types::{redact_token, EphemeralId, IdentityHash, Registration};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One resolved send, prepared before any network call is made.
struct Delivery {
    identity_hash: IdentityHash,
    token: String,
    payload: PushPayload,
}

/// Dispatcher.
pub struct Dispatcher {
    bindings: Arc<dyn EphemeralBindingRepository>,
    registrations: Arc<dyn RegistrationRepository>,
    notifier: Arc<dyn Notifier>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(
        bindings: Arc<dyn EphemeralBindingRepository>,
        registrations: Arc<dyn RegistrationRepository>,
        notifier: Arc<dyn Notifier>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            bindings,
            registrations,
            notifier,
            config,
        }
    }

    /// Resolve every hit into deliveries. No sends happen here.
    async fn resolve(&self, hits: &[Hit], report: &mut DispatchReport) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        let mut seen: HashSet<(usize, IdentityHash)> = HashSet::new();
        let mut registrations: HashMap<IdentityHash, Option<Registration>> = HashMap::new();

        for (index, hit) in hits.iter().enumerate() {
            let ephemeral_id = match hit.ephemeral_id.parse::<EphemeralId>() {
                Ok(id) => id,
                Err(e) => {
                    warn!(raw = %hit.ephemeral_id, error = %e, "[nr-03] Malformed ephemeral id");
                    report.malformed += 1;
                    continue;
                }
            };

            let matches = match self.bindings.find_by_ephemeral_id(ephemeral_id).await {
                Ok(matches) => matches,
                Err(e) => {
                    warn!(ephemeral_id = %ephemeral_id, error = %e, "[nr-03] Binding lookup failed");
                    report.lookup_errors += 1;
                    continue;
                }
            };
            if matches.is_empty() {
                debug!(ephemeral_id = %ephemeral_id, "[nr-03] No binding for hit");
                report.unresolved += 1;
                continue;
            }

            let payload = PushPayload::from_data(&hit.data);
            for binding in matches {
                if !seen.insert((index, binding.identity_hash)) {
                    report.duplicates += 1;
                    continue;
                }

                let registration = match registrations.get(&binding.identity_hash) {
                    Some(cached) => cached.clone(),
                    None => match self.registrations.get(&binding.identity_hash).await {
                        Ok(found) => {
                            registrations.insert(binding.identity_hash, found.clone());
                            found
                        }
                        Err(e) => {
                            warn!(
                                identity = %binding.identity_hash.short(),
                                error = %e,
                                "[nr-03] Registration lookup failed"
                            );
                            report.lookup_errors += 1;
                            continue;
                        }
                    },
                };

                match registration {
                    Some(registration) => deliveries.push(Delivery {
                        identity_hash: registration.identity_hash,
                        token: registration.push_token,
                        payload: payload.clone(),
                    }),
                    None => report.orphaned += 1,
                }
            }
        }
        deliveries
    }
}

#[async_trait]
impl DispatchApi for Dispatcher {
    async fn dispatch(&self, hits: Vec<Hit>) -> DispatchReport {
        let mut report = DispatchReport {
            hits: hits.len(),
            ..DispatchReport::default()
        };
        if hits.is_empty() {
            return report;
        }

        let deliveries = self.resolve(&hits, &mut report).await;

        let notifier = &self.notifier;
        let outcomes: Vec<_> = stream::iter(deliveries)
            .map(|delivery| async move {
                let result = notifier.send(&delivery.token, &delivery.payload).await;
                (delivery, result)
            })
            .buffer_unordered(self.config.max_in_flight.max(1))
            .collect()
            .await;

        for (delivery, result) in outcomes {
            match result {
                Ok(_) => report.sent += 1,
                Err(error) => {
                    let token = redact_token(&delivery.token);
                    warn!(
                        identity = %delivery.identity_hash.short(),
                        token = %token,
                        error = %error,
                        "[nr-03] Push failed"
                    );
                    report.failed.push(DeliveryFailure {
                        identity_hash: delivery.identity_hash,
                        token,
                        error,
                    });
                }
            }
        }

        info!(
            hits = report.hits,
            sent = report.sent,
            failed = report.failed.len(),
            unresolved = report.unresolved,
            malformed = report.malformed,
            "[nr-03] Batch dispatched"
        );
        report
    }
}
