//! Common test utilities for all integration tests.
//!
//! In-memory stores, a failure-injecting vault and stores, and a fake
//! remote cluster with its connector.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

#[cfg(feature = "postgres_tests")]
pub mod postgres;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use chrono::Utc;
use clusterplane::domain::{
    ClusterId, ClusterRegistration, CreateCredentialRequest, CredentialId, CredentialKind,
    CredentialResource, CredentialSpec, MonitoringType, PmmLogin, SecretField, SecretId,
    StorageType,
};
use clusterplane::errors::{BoxError, ClusterplaneError, Result};
use clusterplane::preflight::{ApiKeyIssuer, StorageAccessCheck, StorageTarget};
use clusterplane::remote::{ClusterConnector, DatabaseCluster, RemoteCluster, SecretData};
use clusterplane::secrets::{
    self, open_vault, BarrierVault, MasterKey, MemoryBackend, SecretString, SecretVault,
    SecretsError,
};
use clusterplane::services::{ClusterService, CredentialService, Preflight};
use clusterplane::storage::{ClusterStore, CredentialStore, MemoryClusterStore, MemoryCredentialStore};

pub const TEST_MASTER_KEY: [u8; 32] = [7u8; 32];

/// Barrier vault over an in-memory backend, already unsealed
pub async fn memory_vault() -> (BarrierVault, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let key = MasterKey::from_bytes(&TEST_MASTER_KEY).unwrap();
    let vault = open_vault(backend.clone(), &key).await.unwrap();
    (vault, backend)
}

pub fn object_storage_request(name: &str) -> CreateCredentialRequest {
    CreateCredentialRequest {
        name: name.to_string(),
        description: Some("nightly backups".to_string()),
        spec: CredentialSpec::ObjectStorage {
            storage_type: StorageType::S3,
            bucket: "backups".to_string(),
            region: "us-east-1".to_string(),
            url: Some("https://s3.us-east-1.amazonaws.com".to_string()),
        },
        secrets: BTreeMap::from([
            (SecretField::AccessKey, SecretString::new("AKIAEXAMPLE")),
            (SecretField::SecretKey, SecretString::new("wJalrXUtnFEMI")),
        ]),
        pmm_login: None,
    }
}

pub fn monitoring_request(name: &str) -> CreateCredentialRequest {
    CreateCredentialRequest {
        name: name.to_string(),
        description: None,
        spec: CredentialSpec::Monitoring {
            monitoring_type: MonitoringType::Pmm,
            url: "https://pmm.example.com".to_string(),
        },
        secrets: BTreeMap::from([(SecretField::ApiKey, SecretString::new("pmm-api-key"))]),
        pmm_login: None,
    }
}

/// Monitoring request that asks for a key to be minted from an admin login
pub fn monitoring_login_request(name: &str) -> CreateCredentialRequest {
    CreateCredentialRequest {
        secrets: BTreeMap::new(),
        pmm_login: Some(PmmLogin {
            user: "admin".to_string(),
            password: SecretString::new("pmm-admin-password"),
        }),
        ..monitoring_request(name)
    }
}

pub fn registration(name: &str) -> ClusterRegistration {
    let now = Utc::now();
    ClusterRegistration {
        id: ClusterId::new(),
        name: name.to_string(),
        namespace: "everest".to_string(),
        uid: format!("{}-namespace-uid", name),
        connection_secret_id: SecretId::new(),
        created_at: now,
        updated_at: now,
    }
}

/// Database cluster referencing `storage` from a schedule and `monitoring`
pub fn database_cluster(name: &str, storage: Option<&str>, monitoring: Option<&str>) -> DatabaseCluster {
    let mut spec = serde_json::json!({});
    if let Some(storage) = storage {
        spec["backup"] = serde_json::json!({
            "enabled": true,
            "schedules": [{"name": "daily", "backupStorageName": storage}]
        });
    }
    if let Some(monitoring) = monitoring {
        spec["monitoring"] = serde_json::json!({"monitoringConfigName": monitoring});
    }
    serde_json::from_value(serde_json::json!({
        "apiVersion": "everest.percona.com/v1alpha1",
        "kind": "DatabaseCluster",
        "metadata": {"name": name, "namespace": "everest"},
        "spec": spec
    }))
    .unwrap()
}

/// Database cluster restored from `storage` at creation time
pub fn restored_database_cluster(name: &str, storage: &str) -> DatabaseCluster {
    serde_json::from_value(serde_json::json!({
        "apiVersion": "everest.percona.com/v1alpha1",
        "kind": "DatabaseCluster",
        "metadata": {"name": name, "namespace": "everest"},
        "spec": {"dataSource": {"backupSource": {"path": "/pitr", "backupStorageName": storage}}}
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Failure-injecting vault
// ---------------------------------------------------------------------------

/// Vault wrapper that fails selected operations on demand
pub struct FlakyVault {
    inner: Arc<dyn SecretVault>,
    /// Number of creates allowed before every further create fails
    pub creates_before_failure: AtomicUsize,
    pub fail_creates: AtomicBool,
    pub fail_replaces: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub replace_calls: AtomicUsize,
    /// Zero-based index of the single replace call that fails
    failing_replace: AtomicUsize,
}

impl FlakyVault {
    pub fn new(inner: Arc<dyn SecretVault>) -> Self {
        Self {
            inner,
            creates_before_failure: AtomicUsize::new(usize::MAX),
            fail_creates: AtomicBool::new(false),
            fail_replaces: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            replace_calls: AtomicUsize::new(0),
            failing_replace: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn fail_after_creates(&self, n: usize) {
        self.creates_before_failure.store(n, Ordering::SeqCst);
    }

    /// Let the next `n` replaces through, fail the one after, then recover
    pub fn fail_once_after_replaces(&self, n: usize) {
        let next = self.replace_calls.load(Ordering::SeqCst);
        self.failing_replace.store(next + n, Ordering::SeqCst);
    }

    fn injected(op: &str) -> SecretsError {
        SecretsError::backend_error(format!("injected {} failure", op))
    }
}

#[async_trait]
impl SecretVault for FlakyVault {
    async fn create(&self, id: &SecretId, value: &SecretString) -> secrets::Result<()> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(Self::injected("create"));
        }
        let remaining = self.creates_before_failure.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(Self::injected("create"));
        }
        if remaining != usize::MAX {
            self.creates_before_failure.store(remaining - 1, Ordering::SeqCst);
        }
        self.inner.create(id, value).await
    }

    async fn get(&self, id: &SecretId) -> secrets::Result<SecretString> {
        self.inner.get(id).await
    }

    async fn replace(
        &self,
        old_id: &SecretId,
        new_id: &SecretId,
        value: &SecretString,
    ) -> secrets::Result<SecretString> {
        let call = self.replace_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_replaces.load(Ordering::SeqCst) || call == self.failing_replace.load(Ordering::SeqCst) {
            return Err(Self::injected("replace"));
        }
        self.inner.replace(old_id, new_id, value).await
    }

    async fn delete(&self, id: &SecretId) -> secrets::Result<SecretString> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete"));
        }
        self.inner.delete(id).await
    }
}

// ---------------------------------------------------------------------------
// Preflight fakes
// ---------------------------------------------------------------------------

/// Records every target it is asked about; fails while `fail` is set
#[derive(Default)]
pub struct FakeStorageCheck {
    pub fail: AtomicBool,
    pub checked: Mutex<Vec<StorageTarget>>,
}

#[async_trait]
impl StorageAccessCheck for FakeStorageCheck {
    async fn verify(&self, target: &StorageTarget) -> Result<()> {
        self.checked.lock().unwrap().push(target.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClusterplaneError::validation(
                "Could not connect to the backup storage, please check the new credentials are correct",
            ));
        }
        Ok(())
    }
}

pub const MINTED_API_KEY: &str = "minted-pmm-key";

/// Hands out [`MINTED_API_KEY`] and records the key names requested
#[derive(Default)]
pub struct FakeKeyIssuer {
    pub fail: AtomicBool,
    pub issued: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ApiKeyIssuer for FakeKeyIssuer {
    async fn issue_key(&self, url: &str, key_name: &str, login: &PmmLogin) -> Result<SecretString> {
        if self.fail.load(Ordering::SeqCst) || login.user != "admin" {
            return Err(ClusterplaneError::validation("could not create an API key in PMM"));
        }
        self.issued.lock().unwrap().push((url.to_string(), key_name.to_string()));
        Ok(SecretString::new(MINTED_API_KEY))
    }
}

// ---------------------------------------------------------------------------
// Failure-injecting stores
// ---------------------------------------------------------------------------

fn store_failure(op: &str) -> ClusterplaneError {
    ClusterplaneError::internal(format!("injected {} failure", op))
}

#[derive(Default)]
pub struct FlakyCredentialStore {
    pub inner: MemoryCredentialStore,
    pub fail_create: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
}

#[async_trait]
impl CredentialStore for FlakyCredentialStore {
    async fn create(&self, resource: &CredentialResource) -> Result<CredentialResource> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(store_failure("create"));
        }
        self.inner.create(resource).await
    }

    async fn get(&self, id: &CredentialId) -> Result<CredentialResource> {
        self.inner.get(id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<CredentialResource>> {
        self.inner.get_by_name(name).await
    }

    async fn list(&self, kind: Option<CredentialKind>) -> Result<Vec<CredentialResource>> {
        self.inner.list(kind).await
    }

    async fn update(&self, resource: &CredentialResource) -> Result<CredentialResource> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(store_failure("update"));
        }
        self.inner.update(resource).await
    }

    async fn delete(&self, id: &CredentialId) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(store_failure("delete"));
        }
        self.inner.delete(id).await
    }
}

#[derive(Default)]
pub struct FlakyClusterStore {
    pub inner: MemoryClusterStore,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
}

#[async_trait]
impl ClusterStore for FlakyClusterStore {
    async fn create(&self, registration: &ClusterRegistration) -> Result<ClusterRegistration> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(store_failure("create"));
        }
        self.inner.create(registration).await
    }

    async fn get(&self, id: &ClusterId) -> Result<ClusterRegistration> {
        self.inner.get(id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<ClusterRegistration>> {
        self.inner.get_by_name(name).await
    }

    async fn list(&self) -> Result<Vec<ClusterRegistration>> {
        self.inner.list().await
    }

    async fn delete(&self, id: &ClusterId) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(store_failure("delete"));
        }
        self.inner.delete(id).await
    }
}

// ---------------------------------------------------------------------------
// Fake remote cluster
// ---------------------------------------------------------------------------

/// Canned answer of [`FakeCluster::send`]
#[derive(Debug, Clone)]
pub enum UpstreamReply {
    Json(u16, String),
    Refused,
    Broken,
}

/// A request the fake cluster received
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: http::Method,
    pub uri: String,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

pub struct FakeCluster {
    name: String,
    namespace: String,
    pub uid: String,
    pub unavailable: AtomicBool,
    pub fail_mirror_writes: AtomicBool,
    pub database_clusters: Mutex<Vec<DatabaseCluster>>,
    pub secrets: Mutex<HashMap<String, SecretData>>,
    pub mirrors: Mutex<HashSet<(CredentialKind, String)>>,
    pub reply: Mutex<UpstreamReply>,
    pub sent: Mutex<Vec<SentRequest>>,
}

impl FakeCluster {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: "everest".to_string(),
            uid: format!("{}-namespace-uid", name),
            unavailable: AtomicBool::new(false),
            fail_mirror_writes: AtomicBool::new(false),
            database_clusters: Mutex::new(Vec::new()),
            secrets: Mutex::new(HashMap::new()),
            mirrors: Mutex::new(HashSet::new()),
            reply: Mutex::new(UpstreamReply::Json(200, r#"{"items":[]}"#.to_string())),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_database_clusters(self, workloads: Vec<DatabaseCluster>) -> Self {
        *self.database_clusters.lock().unwrap() = workloads;
        self
    }

    pub fn set_reply(&self, reply: UpstreamReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn has_secret(&self, name: &str) -> bool {
        self.secrets.lock().unwrap().contains_key(name)
    }

    pub fn secret_value(&self, name: &str, key: &str) -> Option<String> {
        self.secrets
            .lock()
            .unwrap()
            .get(name)
            .and_then(|data| data.get(key))
            .map(|value| value.expose_secret().to_string())
    }

    pub fn mirrored(&self, kind: CredentialKind, name: &str) -> bool {
        self.mirrors.lock().unwrap().contains(&(kind, name.to_string()))
    }

    pub fn last_request(&self) -> Option<SentRequest> {
        self.sent.lock().unwrap().last().cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClusterplaneError::ClusterUnavailable { cluster: self.name.clone(), source: None });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCluster for FakeCluster {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn namespace_uid(&self) -> Result<String> {
        self.check_available()?;
        Ok(self.uid.clone())
    }

    async fn list_database_clusters(&self) -> Result<Vec<DatabaseCluster>> {
        self.check_available()?;
        Ok(self.database_clusters.lock().unwrap().clone())
    }

    async fn get_secret(&self, name: &str) -> Result<Option<SecretData>> {
        self.check_available()?;
        Ok(self.secrets.lock().unwrap().get(name).cloned())
    }

    async fn put_secret(&self, name: &str, data: &SecretData) -> Result<Option<SecretData>> {
        self.check_available()?;
        Ok(self.secrets.lock().unwrap().insert(name.to_string(), data.clone()))
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        self.check_available()?;
        self.secrets.lock().unwrap().remove(name);
        Ok(())
    }

    async fn has_mirror(&self, kind: CredentialKind, name: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.mirrored(kind, name))
    }

    async fn put_mirror(&self, resource: &CredentialResource) -> Result<()> {
        self.check_available()?;
        if self.fail_mirror_writes.load(Ordering::SeqCst) {
            return Err(ClusterplaneError::upstream(&self.name, "admission webhook denied the request"));
        }
        self.mirrors.lock().unwrap().insert((resource.kind(), resource.name.clone()));
        Ok(())
    }

    async fn delete_mirror(&self, kind: CredentialKind, name: &str) -> Result<()> {
        self.check_available()?;
        self.mirrors.lock().unwrap().remove(&(kind, name.to_string()));
        Ok(())
    }

    async fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> std::result::Result<http::Response<Body>, BoxError> {
        let (parts, body) = request.into_parts();
        self.sent.lock().unwrap().push(SentRequest {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            UpstreamReply::Json(status, body) => Ok(http::Response::builder()
                .status(status)
                .header(http::header::CONTENT_TYPE, "application/json")
                .header(http::header::CONTENT_LENGTH, body.len())
                .body(Body::from(body))?),
            UpstreamReply::Refused => Err(Box::new(io::Error::from(io::ErrorKind::ConnectionRefused))),
            UpstreamReply::Broken => Err("upstream closed the stream mid-response".into()),
        }
    }
}

/// Connector that hands out [`FakeCluster`]s by registration name
#[derive(Default)]
pub struct FakeConnector {
    clusters: Mutex<HashMap<String, Arc<FakeCluster>>>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn add(&self, cluster: FakeCluster) -> Arc<FakeCluster> {
        let cluster = Arc::new(cluster);
        self.clusters.lock().unwrap().insert(cluster.name.clone(), cluster.clone());
        cluster
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn RemoteCluster>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let cluster = self
            .clusters
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterplaneError::ClusterUnavailable { cluster: name.to_string(), source: None })?;
        Ok(cluster)
    }
}

#[async_trait]
impl ClusterConnector for FakeConnector {
    async fn connect(&self, registration: &ClusterRegistration) -> Result<Arc<dyn RemoteCluster>> {
        self.lookup(&registration.name)
    }

    async fn connect_profile(
        &self,
        name: &str,
        _namespace: &str,
        profile: &SecretString,
    ) -> Result<Arc<dyn RemoteCluster>> {
        if profile.expose_secret().is_empty() {
            return Err(ClusterplaneError::MalformedConnectionProfile {
                cluster: name.to_string(),
                reason: "empty profile".to_string(),
            });
        }
        self.lookup(name)
    }
}

// ---------------------------------------------------------------------------
// Assembled harness
// ---------------------------------------------------------------------------

/// Services over in-memory, failure-injectable dependencies
pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub vault: Arc<FlakyVault>,
    pub credential_store: Arc<FlakyCredentialStore>,
    pub cluster_store: Arc<FlakyClusterStore>,
    pub connector: Arc<FakeConnector>,
    pub storage_check: Arc<FakeStorageCheck>,
    pub key_issuer: Arc<FakeKeyIssuer>,
    pub credentials: CredentialService,
    pub clusters: ClusterService,
}

impl Harness {
    pub async fn new() -> Self {
        let (vault, backend) = memory_vault().await;
        let vault = Arc::new(FlakyVault::new(Arc::new(vault)));
        let credential_store = Arc::new(FlakyCredentialStore::default());
        let cluster_store = Arc::new(FlakyClusterStore::default());
        let connector = Arc::new(FakeConnector::default());
        let storage_check = Arc::new(FakeStorageCheck::default());
        let key_issuer = Arc::new(FakeKeyIssuer::default());

        let credentials = CredentialService::new(
            credential_store.clone(),
            cluster_store.clone(),
            vault.clone(),
            connector.clone(),
            Preflight { storage: storage_check.clone(), keys: key_issuer.clone() },
        );
        let clusters = ClusterService::new(cluster_store.clone(), vault.clone(), connector.clone());

        Self {
            backend,
            vault,
            credential_store,
            cluster_store,
            connector,
            storage_check,
            key_issuer,
            credentials,
            clusters,
        }
    }

    /// Vault entries excluding the keyring
    pub async fn vault_entries(&self) -> usize {
        self.backend.len().await - 1
    }

    /// Register `cluster` directly in the store and the connector
    pub async fn add_cluster(&self, cluster: FakeCluster) -> (ClusterRegistration, Arc<FakeCluster>) {
        let registration = registration(&cluster.name);
        let fake = self.connector.add(cluster);
        let stored = self.cluster_store.create(&registration).await.unwrap();
        (stored, fake)
    }
}
