use std::sync::Arc;

use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_backup_storage_handler, create_monitoring_instance_handler,
    delete_backup_storage_handler, delete_monitoring_instance_handler, get_backup_storage_handler,
    get_cluster_handler, get_monitoring_instance_handler, health_handler,
    list_backup_storages_handler, list_clusters_handler, list_monitoring_instances_handler,
    proxy_collection_handler, proxy_resource_handler, register_cluster_handler,
    unregister_cluster_handler, update_backup_storage_handler, update_monitoring_instance_handler,
};
use crate::auth::{authenticate, PasswordValidator};
use crate::proxy::ReverseProxy;
use crate::services::{ClusterService, CredentialService};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub clusters: ClusterService,
    pub credentials: CredentialService,
    pub proxy: ReverseProxy,
}

/// Build the API router. When `password` is set every route except
/// `/healthz` requires Basic credentials.
pub fn build_router(state: AppState, password: Option<Arc<PasswordValidator>>) -> Router {
    let api = Router::new()
        .route("/v1/kubernetes", get(list_clusters_handler).post(register_cluster_handler))
        .route("/v1/kubernetes/{id}", get(get_cluster_handler).delete(unregister_cluster_handler))
        .route("/v1/kubernetes/{id}/{kind}", any(proxy_collection_handler))
        .route("/v1/kubernetes/{id}/{kind}/{name}", any(proxy_resource_handler))
        .route(
            "/v1/backup-storages",
            get(list_backup_storages_handler).post(create_backup_storage_handler),
        )
        .route(
            "/v1/backup-storages/{id}",
            get(get_backup_storage_handler)
                .patch(update_backup_storage_handler)
                .delete(delete_backup_storage_handler),
        )
        .route(
            "/v1/monitoring-instances",
            get(list_monitoring_instances_handler).post(create_monitoring_instance_handler),
        )
        .route(
            "/v1/monitoring-instances/{id}",
            get(get_monitoring_instance_handler)
                .patch(update_monitoring_instance_handler)
                .delete(delete_monitoring_instance_handler),
        )
        .with_state(state);

    let api = match password {
        Some(validator) => api.layer(middleware::from_fn_with_state(validator, authenticate)),
        None => api,
    };

    Router::new()
        .route("/healthz", get(health_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
}
