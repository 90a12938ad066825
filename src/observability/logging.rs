//! # Structured Logging
//!
//! Span helpers shared by the services and the startup summary.

/// Create a tracing span for a multi-store operation on one resource.
///
/// ```rust,ignore
/// let span = saga_span!("create", "object_storage", "s3-main");
/// ```
#[macro_export]
macro_rules! saga_span {
    ($operation:expr, $kind:expr, $name:expr) => {
        tracing::info_span!(
            "saga",
            operation = %$operation,
            kind = %$kind,
            resource_name = %$name,
            saga_id = %uuid::Uuid::new_v4(),
            resource_id = tracing::field::Empty
        )
    };
}

/// Create a tracing span for a proxied request.
#[macro_export]
macro_rules! proxy_span {
    ($method:expr, $cluster:expr, $path:expr) => {
        tracing::info_span!(
            "proxy_request",
            method = %$method,
            cluster = %$cluster,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            status = tracing::field::Empty
        )
    };
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        server_address = %config.server.bind_address(),
        database_max_connections = config.database.max_connections,
        auto_migrate = config.database.auto_migrate,
        remote_connect_timeout_s = config.remote.connect_timeout_seconds,
        proxy_timeout_s = config.remote.proxy_timeout_seconds,
        verify_storage_access = config.preflight.verify_storage_access,
        auth_enabled = config.auth.enabled,
        metrics_enabled = config.observability.enable_metrics,
        "Clusterplane configuration"
    );
}
