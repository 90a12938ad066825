//! # Metrics Collection
//!
//! Prometheus metrics for the control plane. [`MetricsRecorder`] is a
//! zero-sized handle over the `metrics` facade; when no exporter is
//! installed every call is a no-op.

use crate::config::ObservabilityConfig;
use crate::errors::{ClusterplaneError, Result};
use ::tracing::info;
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record the terminal state of a multi-store operation
    pub fn record_saga_outcome(&self, operation: &str, kind: &str, outcome: &str) {
        let labels = [
            ("operation", operation.to_string()),
            ("kind", kind.to_string()),
            ("outcome", outcome.to_string()),
        ];
        counter!("saga_runs_total", &labels).increment(1);
    }

    /// Record one compensating action
    pub fn record_compensation(&self, action: &str, success: bool) {
        let status = if success { "success" } else { "failure" };
        let labels = [("action", action.to_string()), ("status", status.to_string())];
        counter!("saga_compensations_total", &labels).increment(1);
    }

    /// Record a proxied request that reached the remote cluster
    pub fn record_proxy_request(&self, cluster: &str, status: u16, duration: f64) {
        let labels = [("cluster", cluster.to_string()), ("status", status.to_string())];
        counter!("proxy_requests_total", &labels).increment(1);
        histogram!("proxy_request_duration_seconds", "cluster" => cluster.to_string())
            .record(duration);
    }

    /// Record a proxied request that failed in transport
    pub fn record_proxy_error(&self, cluster: &str, class: &str) {
        let labels = [("cluster", cluster.to_string()), ("class", class.to_string())];
        counter!("proxy_errors_total", &labels).increment(1);
    }

    /// Record a password hash fetch from the remote cluster
    pub fn record_password_hash_fetch(&self, success: bool) {
        let status = if success { "success" } else { "failure" };
        counter!("auth_hash_fetches_total", "status" => status).increment(1);
    }

    pub fn set_registered_clusters(&self, count: usize) {
        gauge!("registered_clusters").set(count as f64);
    }

    pub fn set_credential_resources(&self, kind: &str, count: usize) {
        gauge!("credential_resources", "kind" => kind.to_string()).set(count as f64);
    }

    /// Attach descriptions to every metric this crate emits
    pub fn describe(&self) {
        describe_counter!(
            "saga_runs_total",
            Unit::Count,
            "Create, update and delete runs by terminal outcome"
        );
        describe_counter!(
            "saga_compensations_total",
            Unit::Count,
            "Compensating actions executed after a failed step"
        );
        describe_counter!("proxy_requests_total", Unit::Count, "Requests forwarded to remote clusters");
        describe_histogram!(
            "proxy_request_duration_seconds",
            Unit::Seconds,
            "Latency of forwarded requests"
        );
        describe_counter!(
            "proxy_errors_total",
            Unit::Count,
            "Forwarded requests that failed in transport"
        );
        describe_counter!(
            "auth_hash_fetches_total",
            Unit::Count,
            "Password hash fetches from the auth cluster"
        );
        describe_gauge!("registered_clusters", Unit::Count, "Registered remote clusters");
        describe_gauge!("credential_resources", Unit::Count, "Credential resources by kind");
    }
}

/// Install the Prometheus exporter. Must be called from within a Tokio runtime.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let metrics_addr = config.metrics_bind_address();
    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        ClusterplaneError::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| {
            ClusterplaneError::config(format!("Failed to initialize metrics exporter: {}", e))
        })?;

    MetricsRecorder::new().describe();

    info!(metrics_addr = %metrics_addr, "Metrics collection initialized");
    Ok(())
}
