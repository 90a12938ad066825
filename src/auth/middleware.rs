//! HTTP Basic authentication for the API.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Method, Request},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{info_span, warn, Instrument};

use crate::api::error::ApiError;
use crate::auth::password::PasswordValidator;

pub type PasswordState = Arc<PasswordValidator>;

/// Password carried by a `Basic` authorization header. The user name is
/// not checked.
pub fn basic_password(header: &str) -> Option<String> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (_user, password) = decoded.split_once(':')?;
    Some(password.to_string())
}

/// Middleware entry point that checks the request's Basic credentials.
pub async fn authenticate(
    State(validator): State<PasswordState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let correlation_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "auth_middleware.authenticate",
        http.method = %request.method(),
        http.path = %request.uri().path(),
        correlation_id = %correlation_id
    );

    let password = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(basic_password);
    let Some(password) = password else {
        return Err(ApiError::unauthorized("Unauthorized: missing basic credentials"));
    };

    match validator.validate(&password).instrument(span.clone()).await {
        Ok(true) => Ok(next.run(request).await),
        Ok(false) => {
            span.in_scope(|| warn!(%correlation_id, "authentication failed"));
            Err(ApiError::unauthorized("Unauthorized: invalid credentials"))
        }
        Err(err) => {
            span.in_scope(|| warn!(%correlation_id, error = %err, "password check unavailable"));
            Err(ApiError::service_unavailable("Authentication is temporarily unavailable"))
        }
    }
}
