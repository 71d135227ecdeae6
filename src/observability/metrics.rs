//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `resource_replication_reconciliations_total` - Total number of reconciliations
//! - `resource_replication_reconciliation_errors_total` - Reconciliation errors by reason
//! - `resource_replication_reconciliation_duration_seconds` - Duration of reconciliations
//! - `resource_replication_replications_total` - Replications by kind and operation
//! - `resource_replication_trigger_lookups_total` - Trigger Index lookups by source kind
//! - `resource_replication_trigger_lookup_failures_total` - Trigger Index lookups that could not read declarations
//! - `resource_replication_requeues_total` - Requeues by reason

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "resource_replication_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "resource_replication_reconciliation_errors_total",
            "Total number of reconciliation errors by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "resource_replication_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REPLICATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "resource_replication_replications_total",
            "Total number of replications by kind and operation",
        ),
        &["kind", "operation"],
    )
    .expect("Failed to create REPLICATIONS_TOTAL metric - this should never happen")
});

static TRIGGER_LOOKUPS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "resource_replication_trigger_lookups_total",
            "Total number of source-change lookups by source kind",
        ),
        &["kind"],
    )
    .expect("Failed to create TRIGGER_LOOKUPS_TOTAL metric - this should never happen")
});

static TRIGGER_LOOKUP_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "resource_replication_trigger_lookup_failures_total",
        "Total number of source-change lookups that could not read declarations",
    )
    .expect("Failed to create TRIGGER_LOOKUP_FAILURES_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "resource_replication_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only if a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REPLICATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TRIGGER_LOOKUPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TRIGGER_LOOKUP_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_replications(kind: &str, operation: &str) {
    REPLICATIONS_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
}

pub fn increment_trigger_lookups(kind: &str) {
    TRIGGER_LOOKUPS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_trigger_lookup_failures() {
    TRIGGER_LOOKUP_FAILURES_TOTAL.inc();
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
