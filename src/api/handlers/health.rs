//! Liveness endpoint

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Returns 200 OK while the API server is serving. Does not touch the
/// database or any remote cluster.
pub async fn health_handler() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse { status: "ok".to_string(), version: crate::VERSION.to_string() }),
    )
}
