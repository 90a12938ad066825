//! Backup storage and monitoring instance handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use super::{detached, parse_id};
use crate::api::dto::{
    CreateBackupStorageDto, CreateMonitoringInstanceDto, CredentialResponse, UpdateBackupStorageDto,
    UpdateMonitoringInstanceDto,
};
use crate::api::error::ApiError;
use crate::api::routes::AppState;
use crate::domain::{
    CreateCredentialRequest, CredentialId, CredentialKind, UpdateCredentialRequest,
};

async fn list(state: &AppState, kind: CredentialKind) -> Result<Json<Vec<CredentialResponse>>, ApiError> {
    let resources = state.credentials.list(kind).await?;
    Ok(Json(resources.into_iter().map(CredentialResponse::from).collect()))
}

async fn create(
    state: &AppState,
    request: CreateCredentialRequest,
) -> Result<(StatusCode, Json<CredentialResponse>), ApiError> {
    let service = state.credentials.clone();
    let created = detached(async move { service.create(request).await }).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn get(state: &AppState, kind: CredentialKind, id: &str) -> Result<Json<CredentialResponse>, ApiError> {
    let id: CredentialId = parse_id(id, kind.label())?;
    Ok(Json(state.credentials.get(kind, &id).await?.into()))
}

async fn update(
    state: &AppState,
    kind: CredentialKind,
    id: &str,
    request: UpdateCredentialRequest,
) -> Result<Json<CredentialResponse>, ApiError> {
    let id: CredentialId = parse_id(id, kind.label())?;
    let service = state.credentials.clone();
    let updated = detached(async move { service.update(kind, &id, request).await }).await?;
    Ok(Json(updated.into()))
}

async fn delete(state: &AppState, kind: CredentialKind, id: &str) -> Result<StatusCode, ApiError> {
    let id: CredentialId = parse_id(id, kind.label())?;
    let service = state.credentials.clone();
    detached(async move { service.delete(kind, &id).await }).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_backup_storages_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<CredentialResponse>>, ApiError> {
    list(&state, CredentialKind::ObjectStorage).await
}

pub async fn create_backup_storage_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateBackupStorageDto>,
) -> Result<(StatusCode, Json<CredentialResponse>), ApiError> {
    payload.validate().map_err(|err| ApiError::bad_request(err.to_string()))?;
    create(&state, payload.into()).await
}

pub async fn get_backup_storage_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CredentialResponse>, ApiError> {
    get(&state, CredentialKind::ObjectStorage, &id).await
}

pub async fn update_backup_storage_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateBackupStorageDto>,
) -> Result<Json<CredentialResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::bad_request(err.to_string()))?;
    update(&state, CredentialKind::ObjectStorage, &id, payload.into()).await
}

pub async fn delete_backup_storage_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete(&state, CredentialKind::ObjectStorage, &id).await
}

pub async fn list_monitoring_instances_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<CredentialResponse>>, ApiError> {
    list(&state, CredentialKind::Monitoring).await
}

pub async fn create_monitoring_instance_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateMonitoringInstanceDto>,
) -> Result<(StatusCode, Json<CredentialResponse>), ApiError> {
    payload.validate().map_err(|err| ApiError::bad_request(err.to_string()))?;
    create(&state, payload.into()).await
}

pub async fn get_monitoring_instance_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CredentialResponse>, ApiError> {
    get(&state, CredentialKind::Monitoring, &id).await
}

pub async fn update_monitoring_instance_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateMonitoringInstanceDto>,
) -> Result<Json<CredentialResponse>, ApiError> {
    update(&state, CredentialKind::Monitoring, &id, payload.into()).await
}

pub async fn delete_monitoring_instance_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete(&state, CredentialKind::Monitoring, &id).await
}
