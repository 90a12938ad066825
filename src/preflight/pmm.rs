//! PMM API key minting over PMM's Grafana auth API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ApiKeyIssuer;
use crate::config::PreflightConfig;
use crate::domain::PmmLogin;
use crate::errors::{ClusterplaneError, Result};
use crate::secrets::SecretString;

const KEYS_PATH: &str = "/graph/api/auth/keys";

#[derive(Serialize)]
struct KeyRequest<'a> {
    name: &'a str,
    role: &'a str,
}

#[derive(Deserialize)]
struct KeyResponse {
    key: SecretString,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

/// Mints Admin API keys with basic auth
pub struct PmmKeyIssuer {
    client: Client,
}

impl PmmKeyIssuer {
    pub fn new(config: &PreflightConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| ClusterplaneError::internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn mint_failed(endpoint: &str, reason: String) -> ClusterplaneError {
    warn!(endpoint = %endpoint, reason = %reason, "Failed to mint PMM API key");
    ClusterplaneError::validation("could not create an API key in PMM")
}

#[async_trait]
impl ApiKeyIssuer for PmmKeyIssuer {
    async fn issue_key(&self, url: &str, key_name: &str, login: &PmmLogin) -> Result<SecretString> {
        let endpoint = format!("{}{}", url.trim_end_matches('/'), KEYS_PATH);
        debug!(endpoint = %endpoint, key_name, "Minting PMM API key");

        let response = self
            .client
            .post(&endpoint)
            .basic_auth(&login.user, Some(login.password.expose_secret()))
            .json(&KeyRequest { name: key_name, role: "Admin" })
            .send()
            .await
            .map_err(|e| mint_failed(&endpoint, e.to_string()))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| mint_failed(&endpoint, e.to_string()))?;

        if status.is_client_error() || status.is_server_error() {
            let reason = match serde_json::from_slice::<ErrorResponse>(&body) {
                Ok(err) => format!("PMM returned an error with message: {}", err.message),
                Err(_) => format!("PMM returned an unknown error. HTTP status code {}", status.as_u16()),
            };
            return Err(mint_failed(&endpoint, reason));
        }

        let created: KeyResponse = serde_json::from_slice(&body)
            .map_err(|e| mint_failed(&endpoint, format!("unexpected response body: {}", e)))?;
        Ok(created.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use base64::Engine;
    use serde_json::{json, Value};

    async fn keys(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let expected = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("admin:letmein")
        );
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected);
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({"message": "invalid username or password"})));
        }
        if body["role"] != "Admin" {
            return (StatusCode::BAD_REQUEST, Json(json!({"message": "role must be Admin"})));
        }
        let name = body["name"].as_str().unwrap_or_default();
        (StatusCode::OK, Json(json!({"id": 7, "name": name, "key": format!("minted-{}", name)})))
    }

    async fn spawn_pmm() -> String {
        let app = Router::new().route(KEYS_PATH, post(keys));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn issuer() -> PmmKeyIssuer {
        PmmKeyIssuer::new(&PreflightConfig::default()).unwrap()
    }

    fn login(password: &str) -> PmmLogin {
        PmmLogin { user: "admin".into(), password: SecretString::new(password) }
    }

    #[tokio::test]
    async fn mints_admin_key_with_basic_auth() {
        let url = spawn_pmm().await;
        let key = issuer().issue_key(&url, "clusterplane-pmm-1", &login("letmein")).await.unwrap();
        assert_eq!(key.expose_secret(), "minted-clusterplane-pmm-1");
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn rejected_login_is_a_validation_error() {
        let url = spawn_pmm().await;
        let err = issuer().issue_key(&url, "k", &login("wrong")).await.unwrap_err();

        assert!(matches!(err, ClusterplaneError::Validation { .. }));
        assert!(err.to_string().contains("could not create an API key in PMM"));
        assert!(logs_contain("invalid username or password"));
    }

    #[tokio::test]
    async fn unreachable_instance_is_a_validation_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = issuer().issue_key(&url, "k", &login("letmein")).await.unwrap_err();
        assert!(matches!(err, ClusterplaneError::Validation { .. }));
    }
}
