//! # Reverse Proxy Translator
//!
//! Forwards `/v1/kubernetes/{id}/{kind}[/{name}]` requests to the registered
//! cluster's API server. Writes of workload resources first mirror the
//! credential resources they reference into the target cluster.

pub mod rewrite;
pub mod translate;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Method, Request, Response, Uri};
use serde_json::Value;
use tracing::{debug, Instrument};

use crate::domain::validation::validate_path_segment;
use crate::domain::{ClusterId, CredentialKind};
use crate::errors::{ClusterplaneError, Result};
use crate::observability::MetricsRecorder;
use crate::proxy_span;
use crate::remote::{classify_transport_error, ClusterConnector};
use crate::services::CredentialService;
use crate::storage::ClusterStore;

pub use rewrite::{rewrite_status_body, should_rewrite};
pub use translate::translate;

/// Header naming the registration a proxied request targets
pub const CLUSTER_NAME_HEADER: &str = "x-cluster-name";

/// Largest request or rewritten response body the proxy buffers
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Credential resources a workload body refers to
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorReferences {
    pub backup_storages: Vec<String>,
    pub monitoring_configs: Vec<String>,
}

impl MirrorReferences {
    pub fn is_empty(&self) -> bool {
        self.backup_storages.is_empty() && self.monitoring_configs.is_empty()
    }

    fn push(names: &mut Vec<String>, value: Option<&Value>) {
        if let Some(name) = value.and_then(Value::as_str).filter(|n| !n.is_empty()) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
}

/// Names referenced by a POST/PUT body of `kind`.
///
/// Bodies that are not JSON yield nothing; the remote API rejects them.
pub fn mirror_references(kind: &str, body: &[u8]) -> MirrorReferences {
    let mut refs = MirrorReferences::default();
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return refs;
    };

    match kind {
        "database-clusters" => {
            if let Some(schedules) = value.pointer("/spec/backup/schedules").and_then(Value::as_array) {
                for schedule in schedules {
                    MirrorReferences::push(&mut refs.backup_storages, schedule.get("backupStorageName"));
                }
            }
            MirrorReferences::push(
                &mut refs.backup_storages,
                value.pointer("/spec/dataSource/backupSource/backupStorageName"),
            );
            MirrorReferences::push(
                &mut refs.monitoring_configs,
                value.pointer("/spec/monitoring/monitoringConfigName"),
            );
        }
        "database-cluster-backups" => {
            MirrorReferences::push(&mut refs.backup_storages, value.pointer("/spec/backupStorageName"));
        }
        "database-cluster-restores" => {
            MirrorReferences::push(
                &mut refs.backup_storages,
                value.pointer("/spec/dataSource/backupSource/backupStorageName"),
            );
        }
        _ => {}
    }
    refs
}

/// Forwards requests to registered clusters
#[derive(Clone)]
pub struct ReverseProxy {
    clusters: Arc<dyn ClusterStore>,
    connector: Arc<dyn ClusterConnector>,
    credentials: CredentialService,
    metrics: MetricsRecorder,
    body_limit: usize,
}

impl ReverseProxy {
    pub fn new(
        clusters: Arc<dyn ClusterStore>,
        connector: Arc<dyn ClusterConnector>,
        credentials: CredentialService,
    ) -> Self {
        Self {
            clusters,
            connector,
            credentials,
            metrics: MetricsRecorder::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Forward `request` to the cluster registered under `id`.
    ///
    /// `kind` is the hyphenated collection segment and `name` the optional
    /// resource name, both taken from the request path. Segments that are
    /// not RFC-1123 labels are rejected before the cluster is looked up.
    pub async fn forward(
        &self,
        id: &ClusterId,
        kind: &str,
        name: Option<&str>,
        request: Request<Body>,
    ) -> Result<Response<Body>> {
        validate_path_segment("kind", kind)?;
        if let Some(name) = name {
            validate_path_segment("name", name)?;
        }

        let registration = self.clusters.get(id).await?;
        let span = proxy_span!(request.method(), registration.name, request.uri().path());
        let started = Instant::now();

        let result = async {
            let remote = self.connector.connect(&registration).await?;
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, self.body_limit).await.map_err(|e| {
                ClusterplaneError::validation(format!("Failed to read request body: {}", e))
            })?;

            if matches!(parts.method, Method::POST | Method::PUT) {
                let refs = mirror_references(kind, &body);
                if !refs.is_empty() {
                    debug!(?refs, "Mirroring referenced credential resources");
                    self.credentials
                        .ensure_mirrors(remote.as_ref(), CredentialKind::ObjectStorage, &refs.backup_storages)
                        .await?;
                    self.credentials
                        .ensure_mirrors(remote.as_ref(), CredentialKind::Monitoring, &refs.monitoring_configs)
                        .await?;
                }
            }

            let path = translate(
                parts.uri.path(),
                registration.id.as_str(),
                name.unwrap_or_default(),
                &registration.namespace,
            );
            let upstream = build_upstream_request(
                parts.method,
                &path,
                parts.uri.query(),
                &parts.headers,
                &registration.name,
                body,
            )?;

            let response = match remote.send(upstream).await {
                Ok(response) => response,
                Err(err) => {
                    let classified = classify_transport_error(&registration.name, err);
                    let class = match classified {
                        ClusterplaneError::ClusterUnavailable { .. } => "unavailable",
                        _ => "upstream",
                    };
                    self.metrics.record_proxy_error(&registration.name, class);
                    return Err(classified);
                }
            };

            tracing::Span::current().record("status", response.status().as_u16());
            self.finish_response(&registration.name, response).await
        }
        .instrument(span)
        .await;

        let status = match &result {
            Ok(response) => response.status().as_u16(),
            Err(err) => err.status_code(),
        };
        self.metrics.record_proxy_request(&registration.name, status, started.elapsed().as_secs_f64());
        result
    }

    async fn finish_response(&self, cluster: &str, response: Response<Body>) -> Result<Response<Body>> {
        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        if !should_rewrite(parts.status) {
            return Ok(Response::from_parts(parts, body));
        }

        let bytes = axum::body::to_bytes(body, self.body_limit).await.map_err(|e| {
            ClusterplaneError::upstream(cluster, format!("Failed to read upstream response: {}", e))
        })?;
        let bytes = match rewrite_status_body(&bytes) {
            Some(rewritten) => Bytes::from(rewritten),
            None => bytes,
        };
        parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        Ok(Response::from_parts(parts, Body::from(bytes)))
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Upstream request carrying the translated path and filtered headers
pub fn build_upstream_request(
    method: Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    cluster_name: &str,
    body: Bytes,
) -> Result<Request<Bytes>> {
    let path_and_query = match query {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let uri: Uri = path_and_query
        .parse()
        .map_err(|e| ClusterplaneError::validation(format!("Invalid proxied path: {}", e)))?;

    let mut forwarded = headers.clone();
    strip_hop_by_hop(&mut forwarded);
    forwarded.remove(header::HOST);
    forwarded.remove(header::AUTHORIZATION);
    forwarded.remove(header::CONTENT_LENGTH);
    let cluster_header = HeaderValue::from_str(cluster_name)
        .map_err(|e| ClusterplaneError::internal(format!("Invalid cluster name header: {}", e)))?;
    forwarded.insert(HeaderName::from_static(CLUSTER_NAME_HEADER), cluster_header);

    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body)
        .map_err(|e| ClusterplaneError::internal(format!("Failed to build upstream request: {}", e)))?;
    *request.headers_mut() = forwarded;
    Ok(request)
}
