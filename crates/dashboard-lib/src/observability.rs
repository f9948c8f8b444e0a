//! Observability infrastructure for the dashboard
//!
//! Provides:
//! - Prometheus metrics (control-plane errors, cache efficiency, mutations,
//!   alert delivery, monitor scan latency)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for monitor scan latency (in seconds)
const SCAN_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DashboardMetricsInner> = OnceLock::new();

struct DashboardMetricsInner {
    control_plane_errors: IntCounterVec,
    cache_hits: IntCounterVec,
    cache_misses: IntCounterVec,
    mutations: IntCounterVec,
    alerts_sent: IntCounter,
    alerts_failed: IntCounter,
    scan_latency_seconds: Histogram,
    pods_scanned: IntGauge,
    metric_rows_skipped: IntCounter,
}

impl DashboardMetricsInner {
    fn new() -> Self {
        Self {
            control_plane_errors: register_int_counter_vec!(
                "kube_dashboard_control_plane_errors_total",
                "Failed control plane calls by operation",
                &["operation"]
            )
            .expect("Failed to register control_plane_errors"),

            cache_hits: register_int_counter_vec!(
                "kube_dashboard_cache_hits_total",
                "Reads served from the read-through cache",
                &["op"]
            )
            .expect("Failed to register cache_hits"),

            cache_misses: register_int_counter_vec!(
                "kube_dashboard_cache_misses_total",
                "Reads that went to the control plane",
                &["op"]
            )
            .expect("Failed to register cache_misses"),

            mutations: register_int_counter_vec!(
                "kube_dashboard_mutations_total",
                "Mutation requests by operation and outcome",
                &["operation", "outcome"]
            )
            .expect("Failed to register mutations"),

            alerts_sent: register_int_counter!(
                "kube_dashboard_alerts_sent_total",
                "Alerts delivered to the notifier"
            )
            .expect("Failed to register alerts_sent"),

            alerts_failed: register_int_counter!(
                "kube_dashboard_alerts_failed_total",
                "Alerts the notifier failed to deliver"
            )
            .expect("Failed to register alerts_failed"),

            scan_latency_seconds: register_histogram!(
                "kube_dashboard_monitor_scan_seconds",
                "Duration of one health monitor scan",
                SCAN_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register scan_latency_seconds"),

            pods_scanned: register_int_gauge!(
                "kube_dashboard_monitor_pods_scanned",
                "Pods inspected by the last monitor scan"
            )
            .expect("Failed to register pods_scanned"),

            metric_rows_skipped: register_int_counter!(
                "kube_dashboard_metric_rows_skipped_total",
                "Node metric rows dropped because their quantities could not be normalized"
            )
            .expect("Failed to register metric_rows_skipped"),
        }
    }
}

/// Dashboard metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct DashboardMetrics {
    _private: (),
}

impl Default for DashboardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DashboardMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DashboardMetricsInner {
        GLOBAL_METRICS.get_or_init(DashboardMetricsInner::new)
    }

    pub fn inc_control_plane_error(&self, operation: &str) {
        self.inner()
            .control_plane_errors
            .with_label_values(&[operation])
            .inc();
    }

    pub fn inc_cache_hit(&self, op: &str) {
        self.inner().cache_hits.with_label_values(&[op]).inc();
    }

    pub fn inc_cache_miss(&self, op: &str) {
        self.inner().cache_misses.with_label_values(&[op]).inc();
    }

    pub fn record_mutation(&self, operation: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.inner()
            .mutations
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn inc_alerts_sent(&self) {
        self.inner().alerts_sent.inc();
    }

    pub fn inc_alerts_failed(&self) {
        self.inner().alerts_failed.inc();
    }

    pub fn observe_scan_latency(&self, duration_secs: f64) {
        self.inner().scan_latency_seconds.observe(duration_secs);
    }

    pub fn set_pods_scanned(&self, count: i64) {
        self.inner().pods_scanned.set(count);
    }

    pub fn inc_metric_rows_skipped(&self) {
        self.inner().metric_rows_skipped.inc();
    }
}

/// Structured logger for dashboard events
///
/// Every record carries an `event` field so log pipelines can filter
/// mutations, alerts and lifecycle changes without parsing messages.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, listen_port: u16) {
        info!(
            event = "dashboard_started",
            instance = %self.instance,
            version = %version,
            listen_port = listen_port,
            "Dashboard started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "dashboard_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Dashboard shutting down"
        );
    }

    /// Log the outcome of a mutation request
    pub fn log_mutation(
        &self,
        operation: &str,
        namespace: &str,
        name: &str,
        error: Option<&dyn std::error::Error>,
    ) {
        match error {
            None => info!(
                event = "mutation_applied",
                instance = %self.instance,
                operation = %operation,
                namespace = %namespace,
                name = %name,
                "Mutation applied"
            ),
            Some(e) => warn!(
                event = "mutation_failed",
                instance = %self.instance,
                operation = %operation,
                namespace = %namespace,
                name = %name,
                error = %e,
                "Mutation failed"
            ),
        }
    }

    pub fn log_alert(&self, kind: &str, namespace: &str, pod_name: &str, delivered: bool) {
        if delivered {
            info!(
                event = "alert_sent",
                instance = %self.instance,
                kind = %kind,
                namespace = %namespace,
                pod_name = %pod_name,
                "Alert delivered"
            );
        } else {
            warn!(
                event = "alert_failed",
                instance = %self.instance,
                kind = %kind,
                namespace = %namespace,
                pod_name = %pod_name,
                "Alert delivery failed"
            );
        }
    }

    pub fn log_toggle(&self, enabled: bool) {
        info!(
            event = "alerting_toggled",
            instance = %self.instance,
            enabled = enabled,
            "Health monitor alerting toggled"
        );
    }

    pub fn log_scan(&self, pods: usize, alerts: usize, failed: usize, elapsed_ms: u128) {
        info!(
            event = "monitor_scan",
            instance = %self.instance,
            pods = pods,
            alerts = alerts,
            failed_deliveries = failed,
            elapsed_ms = elapsed_ms,
            "Health monitor scan complete"
        );
    }
}
