// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Service endpoint source.
//!
//! All metrics use the namespace prefix `svcdns`.
//!
//! # Metrics Categories
//!
//! - **Translation Metrics** - Track translation calls, their outcome and duration
//! - **Filter Metrics** - Track Services skipped before translation and why
//! - **Lookup Metrics** - Track failed load-balancer hostname lookups
//! - **Watch Metrics** - Track events applied to the watch caches
//!
//! # Example
//!
//! ```rust,no_run
//! use svcdns::metrics::record_translation_success;
//!
//! // Record a translation that produced 12 endpoints
//! record_translation_success(std::time::Duration::from_millis(3), 12);
//! ```

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "svcdns";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Translation Metrics
// ============================================================================

/// Total number of translation calls by status
///
/// Labels:
/// - `status`: Outcome (`success`, `error`)
pub static TRANSLATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_translations_total"),
        "Total number of Service translations by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of translation calls in seconds
pub static TRANSLATION_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_translation_duration_seconds"),
        "Duration of Service translations in seconds",
    )
    .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Number of endpoints produced by the last successful translation
pub static ENDPOINTS_GENERATED: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_endpoints_generated"),
        "Number of endpoints produced by the last successful translation",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Filter Metrics
// ============================================================================

/// Total number of Services skipped during translation
///
/// Labels:
/// - `reason`: Why the Service was skipped (`annotation_filter`, `controller`,
///   `service_type`, `no_hostnames`)
pub static SERVICES_SKIPPED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_services_skipped_total"),
        "Total number of Services skipped during translation by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Lookup Metrics
// ============================================================================

/// Total number of failed load-balancer hostname lookups
pub static HOSTNAME_LOOKUP_FAILURES_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_hostname_lookup_failures_total"),
        "Total number of failed load-balancer hostname lookups",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Watch Metrics
// ============================================================================

/// Total number of watch events applied to the caches
///
/// Labels:
/// - `kind`: Object kind (`Service`, `Node`, `Pod`, `EndpointSlice`)
pub static WATCH_EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_watch_events_total"),
        "Total number of watch events applied to the caches by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful translation
///
/// # Arguments
/// * `duration` - Duration of the translation
/// * `endpoints` - Number of endpoints produced
pub fn record_translation_success(duration: Duration, endpoints: usize) {
    TRANSLATIONS_TOTAL.with_label_values(&["success"]).inc();
    TRANSLATION_DURATION_SECONDS.observe(duration.as_secs_f64());
    #[allow(clippy::cast_precision_loss)]
    ENDPOINTS_GENERATED.set(endpoints as f64);
}

/// Record a failed translation
///
/// # Arguments
/// * `duration` - Duration of the translation before failure
pub fn record_translation_error(duration: Duration) {
    TRANSLATIONS_TOTAL.with_label_values(&["error"]).inc();
    TRANSLATION_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record a Service skipped before translation
///
/// # Arguments
/// * `reason` - Why the Service was skipped
pub fn record_service_skipped(reason: &str) {
    SERVICES_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a failed hostname lookup
pub fn record_hostname_lookup_failure() {
    HOSTNAME_LOOKUP_FAILURES_TOTAL.inc();
}

/// Record a watch event
///
/// # Arguments
/// * `kind` - Kind of the object the event was for
pub fn record_watch_event(kind: &str) {
    WATCH_EVENTS_TOTAL.with_label_values(&[kind]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
