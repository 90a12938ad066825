//! Reverse proxy handlers for `/v1/kubernetes/{id}/{kind}[/{name}]`

use axum::{
    body::Body,
    extract::{Path, Request, State},
    response::Response,
};

use super::{detached, parse_id};
use crate::api::error::ApiError;
use crate::api::routes::AppState;
use crate::domain::ClusterId;

async fn forward(
    state: AppState,
    id: String,
    kind: String,
    name: Option<String>,
    request: Request,
) -> Result<Response<Body>, ApiError> {
    let id: ClusterId = parse_id(&id, "Kubernetes cluster")?;
    let proxy = state.proxy.clone();
    detached(async move { proxy.forward(&id, &kind, name.as_deref(), request).await }).await
}

pub async fn proxy_collection_handler(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
    request: Request,
) -> Result<Response<Body>, ApiError> {
    forward(state, id, kind, None, request).await
}

pub async fn proxy_resource_handler(
    State(state): State<AppState>,
    Path((id, kind, name)): Path<(String, String, String)>,
    request: Request,
) -> Result<Response<Body>, ApiError> {
    forward(state, id, kind, Some(name), request).await
}
