//! # Observability Infrastructure
//!
//! Structured logging through `tracing`, and Prometheus metrics through the
//! `metrics` facade.

pub mod logging;
pub mod metrics;

pub use logging::log_config_info;
pub use metrics::{init_metrics, MetricsRecorder};

use crate::config::ObservabilityConfig;
use crate::errors::{ClusterplaneError, Result};
use ::tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured log level.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            ClusterplaneError::config(format!("Invalid log level '{}': {}", config.log_level, e))
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json_logging {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| {
        ClusterplaneError::config_with_source("Failed to install tracing subscriber", e)
    })?;

    Ok(())
}

/// Initialize all observability components
pub async fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_tracing(config)?;

    if config.enable_metrics {
        init_metrics(config)?;
    }

    info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        json_logging = config.json_logging,
        metrics_enabled = config.enable_metrics,
        "Observability initialized successfully"
    );

    Ok(())
}
