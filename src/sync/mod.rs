//! # Sync
//!
//! Lifecycle orchestration over an injected API session.
//!
//! The orchestrators own no state. Each call works on the caller's copy of an
//! entity and writes progress back into it as it goes, so when an error is
//! returned the copy still shows how far the run got (a client id assigned
//! before a failed child write, secrets created before a failed creation).
//! Remote calls are issued one at a time and never retried.

mod account;
mod client;

pub use account::AccountSync;
pub use client::{ClientSync, SyncReport};

use crate::observability::metrics;
use crate::reconciler::ReconcileError;
use std::time::Instant;
use tracing::{error, warn};

/// Record the outcome of one reconciliation
fn finish<T>(
    entity: &str,
    phase: &str,
    start: Instant,
    result: Result<T, ReconcileError>,
) -> Result<T, ReconcileError> {
    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        metrics::increment_reconciliation_errors(e.kind());
        if e.needs_operator() {
            error!(
                entity,
                phase,
                error = %e,
                "Reconciliation stopped in a state that needs attention"
            );
        } else {
            warn!(entity, phase, error = %e, retryable = e.is_retryable(), "Reconciliation failed");
        }
    }
    result
}
