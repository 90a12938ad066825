//! Cluster registration handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use super::{detached, parse_id};
use crate::api::dto::{ClusterResponse, RegisterClusterDto, UnregisterQuery};
use crate::api::error::ApiError;
use crate::api::routes::AppState;
use crate::domain::{ClusterId, RegisterClusterRequest};
use crate::services::UnregisterOptions;

pub async fn list_clusters_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClusterResponse>>, ApiError> {
    let clusters = state.clusters.list().await?;
    Ok(Json(clusters.into_iter().map(ClusterResponse::from).collect()))
}

pub async fn register_cluster_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterClusterDto>,
) -> Result<(StatusCode, Json<ClusterResponse>), ApiError> {
    payload.validate().map_err(|err| ApiError::bad_request(err.to_string()))?;
    let request = RegisterClusterRequest::from(payload);
    let service = state.clusters.clone();
    let registration = detached(async move { service.register(request).await }).await?;
    Ok((StatusCode::CREATED, Json(registration.into())))
}

pub async fn get_cluster_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClusterResponse>, ApiError> {
    let id: ClusterId = parse_id(&id, "Kubernetes cluster")?;
    Ok(Json(state.clusters.get(&id).await?.into()))
}

pub async fn unregister_cluster_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UnregisterQuery>,
) -> Result<StatusCode, ApiError> {
    let id: ClusterId = parse_id(&id, "Kubernetes cluster")?;
    let options = UnregisterOptions { force: query.force, ignore_unavailable: query.ignore_unavailable };
    let service = state.clusters.clone();
    detached(async move { service.unregister(&id, options).await }).await?;
    Ok(StatusCode::NO_CONTENT)
}
