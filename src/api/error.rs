use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::errors::ClusterplaneError;
use crate::secrets::SecretsError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Conflict(String),
    NotFound(String),
    Unauthorized(String),
    BadGateway(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn service_unavailable<S: Into<String>>(msg: S) -> Self {
        ApiError::ServiceUnavailable(msg.into())
    }

    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        ApiError::Unauthorized(msg.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let error_kind = match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::NotFound(_) => "not_found",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::BadGateway(_) => "upstream_failure",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Internal(_) => "internal_error",
        };
        let challenge = matches!(self, ApiError::Unauthorized(_));

        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::Internal(msg) => msg,
        };

        let mut response = (status, Json(ErrorBody { error: error_kind, message })).into_response();
        if challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"clusterplane\""));
        }
        response
    }
}

impl From<ClusterplaneError> for ApiError {
    fn from(err: ClusterplaneError) -> Self {
        match err {
            ClusterplaneError::Validation { .. } | ClusterplaneError::MalformedConnectionProfile { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            ClusterplaneError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ClusterplaneError::Conflict { .. } | ClusterplaneError::InUse { .. } => {
                ApiError::Conflict(err.to_string())
            }
            ClusterplaneError::ClusterUnavailable { .. } => ApiError::ServiceUnavailable(err.to_string()),
            ClusterplaneError::Upstream { .. } => ApiError::BadGateway(err.to_string()),
            ClusterplaneError::Vault(SecretsError::NotFound { .. }) => {
                ApiError::NotFound("Secret not found".to_string())
            }
            ClusterplaneError::Vault(SecretsError::Sealed | SecretsError::NotInitialized) => {
                ApiError::ServiceUnavailable("Secret vault is not available".to_string())
            }
            ClusterplaneError::Inconsistency { .. } => {
                // Orphaned ids are already logged by the saga.
                ApiError::Internal(
                    "The operation failed and could not be fully rolled back; an operator has been alerted"
                        .to_string(),
                )
            }
            other => {
                error!(error = %other, "Request failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}
