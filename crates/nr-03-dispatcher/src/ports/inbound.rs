//! # Inbound Ports

use crate::domain::{DispatchReport, Hit};
use async_trait::async_trait;

/// Dispatch API - inbound port.
///
/// Infallible: per-hit and per-token problems are folded into the report.
#[async_trait]
pub trait DispatchApi: Send + Sync {
    /// Resolve and notify one batch of hits.
    async fn dispatch(&self, hits: Vec<Hit>) -> DispatchReport;
}
