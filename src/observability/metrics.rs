//! # Metrics
//!
//! Prometheus metrics for reconciliation runs and identity API traffic.
//!
//! ## Metrics Exposed
//!
//! - `identity_reconciler_reconciliations_total` - Reconciliations by entity and phase
//! - `identity_reconciler_reconciliation_errors_total` - Reconciliation errors by kind
//! - `identity_reconciler_reconciliation_duration_seconds` - Duration of reconciliations
//! - `identity_reconciler_api_operations_total` - Identity API calls by operation
//! - `identity_reconciler_api_operation_duration_seconds` - Duration of identity API calls
//! - `identity_reconciler_api_operation_errors_total` - Failed identity API calls by operation
//! - `identity_reconciler_secrets_created_total` - Client secrets generated
//! - `identity_reconciler_items_soft_deleted_total` - Child items marked deleted, by collection

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder,
};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "identity_reconciler_reconciliations_total",
            "Total number of reconciliations by entity and phase",
        ),
        &["entity", "phase"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "identity_reconciler_reconciliation_errors_total",
            "Total number of reconciliation errors by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "identity_reconciler_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static API_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "identity_reconciler_api_operations_total",
            "Total number of identity API operations",
        ),
        &["operation"],
    )
    .expect("Failed to create API_OPERATIONS_TOTAL metric - this should never happen")
});

static API_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "identity_reconciler_api_operation_duration_seconds",
            "Duration of identity API operations in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create API_OPERATION_DURATION metric - this should never happen")
});

static API_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "identity_reconciler_api_operation_errors_total",
            "Total number of failed identity API operations",
        ),
        &["operation"],
    )
    .expect("Failed to create API_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static SECRETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "identity_reconciler_secrets_created_total",
        "Total number of client secrets generated",
    )
    .expect("Failed to create SECRETS_CREATED_TOTAL metric - this should never happen")
});

static ITEMS_SOFT_DELETED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "identity_reconciler_items_soft_deleted_total",
            "Total number of child items marked deleted",
        ),
        &["collection"],
    )
    .expect("Failed to create ITEMS_SOFT_DELETED_TOTAL metric - this should never happen")
});

/// Register every metric with the crate registry. Calling it again is a no-op.
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RECONCILIATIONS_TOTAL.clone()),
        Box::new(RECONCILIATION_ERRORS_TOTAL.clone()),
        Box::new(RECONCILIATION_DURATION.clone()),
        Box::new(API_OPERATIONS_TOTAL.clone()),
        Box::new(API_OPERATION_DURATION.clone()),
        Box::new(API_OPERATION_ERRORS_TOTAL.clone()),
        Box::new(SECRETS_CREATED_TOTAL.clone()),
        Box::new(ITEMS_SOFT_DELETED_TOTAL.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Render the registry in the Prometheus text exposition format
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn render() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_reconciliations(entity: &str, phase: &str) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[entity, phase])
        .inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn record_api_operation(operation: &str, duration: f64) {
    API_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    API_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_api_operation_errors(operation: &str) {
    API_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn increment_secrets_created() {
    SECRETS_CREATED_TOTAL.inc();
}

pub fn increment_items_soft_deleted(collection: &str, count: usize) {
    if count > 0 {
        ITEMS_SOFT_DELETED_TOTAL
            .with_label_values(&[collection])
            .inc_by(count as u64);
    }
}
