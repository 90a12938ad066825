//! HTTP request handlers organized by resource type

pub mod clusters;
pub mod credentials;
pub mod health;
pub mod proxy;

use std::future::Future;
use std::str::FromStr;

use crate::api::error::ApiError;
use crate::errors::ClusterplaneError;

pub use clusters::{
    get_cluster_handler, list_clusters_handler, register_cluster_handler,
    unregister_cluster_handler,
};
pub use credentials::{
    create_backup_storage_handler, create_monitoring_instance_handler,
    delete_backup_storage_handler, delete_monitoring_instance_handler, get_backup_storage_handler,
    get_monitoring_instance_handler, list_backup_storages_handler,
    list_monitoring_instances_handler, update_backup_storage_handler,
    update_monitoring_instance_handler,
};
pub use health::health_handler;
pub use proxy::{proxy_collection_handler, proxy_resource_handler};

/// Run `operation` on its own task so a dropped connection cannot cancel it
/// between a write and its compensation.
pub(crate) async fn detached<F, T>(operation: F) -> Result<T, ApiError>
where
    F: Future<Output = crate::errors::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|err| ApiError::from(ClusterplaneError::internal(format!("Task failed: {}", err))))?
        .map_err(ApiError::from)
}

/// Unknown ids are reported as not found rather than as malformed input
pub(crate) fn parse_id<T>(raw: &str, resource_type: &str) -> Result<T, ApiError>
where
    T: FromStr,
{
    raw.parse::<T>()
        .map_err(|_| ApiError::from(ClusterplaneError::not_found(resource_type, raw)))
}
