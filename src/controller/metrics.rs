//! Prometheus metrics for the snitch operator
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports the following metrics:
//! - `dms_reconcile_duration_seconds` (histogram): reconcile duration labeled by controller.
//! - `dms_reconcile_errors_total` (counter): reconcile errors labeled by controller and kind.
//! - `dms_reconcile_decisions_total` (counter): decisions taken labeled by decision.
//! - `dms_snitch_operations_total` (counter): monitor API calls labeled by operation and result.

use std::sync::atomic::AtomicU64;

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Labels for operator reconcile metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    /// Controller name, e.g. "clusterdeployment"
    pub controller: String,
}

/// Labels for operator error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub controller: String,
    /// Error kind/category, e.g. "kube", "monitor", "conflict"
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DecisionLabels {
    pub decision: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct SnitchOperationLabels {
    /// "create", "delete", "find" or "check_in"
    pub operation: String,
    /// "success" or "error"
    pub result: String,
}

/// Histogram tracking reconcile duration (seconds)
pub static RECONCILE_DURATION_SECONDS: Lazy<Family<ReconcileLabels, Histogram>> = Lazy::new(|| {
    fn reconcile_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(reconcile_histogram)
});

/// Counter tracking reconcile errors
pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static RECONCILE_DECISIONS_TOTAL: Lazy<Family<DecisionLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static SNITCH_OPERATIONS_TOTAL: Lazy<Family<SnitchOperationLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "dms_reconcile_duration_seconds",
        "Duration of reconcile loops in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "dms_reconcile_errors_total",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );
    registry.register(
        "dms_reconcile_decisions_total",
        "Total number of reconcile decisions by outcome",
        RECONCILE_DECISIONS_TOTAL.clone(),
    );
    registry.register(
        "dms_snitch_operations_total",
        "Total number of Dead Man's Snitch API operations",
        SNITCH_OPERATIONS_TOTAL.clone(),
    );

    registry
});

/// Observe reconcile duration
pub fn observe_reconcile_duration_seconds(controller: &str, seconds: f64) {
    RECONCILE_DURATION_SECONDS
        .get_or_create(&ReconcileLabels {
            controller: controller.to_string(),
        })
        .observe(seconds);
}

/// Increment reconcile error counter
pub fn inc_reconcile_error(controller: &str, kind: &str) {
    RECONCILE_ERRORS_TOTAL
        .get_or_create(&ErrorLabels {
            controller: controller.to_string(),
            kind: kind.to_string(),
        })
        .inc();
}

pub fn inc_decision(decision: &str) {
    RECONCILE_DECISIONS_TOTAL
        .get_or_create(&DecisionLabels {
            decision: decision.to_string(),
        })
        .inc();
}

pub fn inc_snitch_operation(operation: &str, success: bool) {
    SNITCH_OPERATIONS_TOTAL
        .get_or_create(&SnitchOperationLabels {
            operation: operation.to_string(),
            result: if success { "success" } else { "error" }.to_string(),
        })
        .inc();
}
