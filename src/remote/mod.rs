//! # Remote Cluster Client Factory
//!
//! A [`ClusterConnector`] turns a registration (or a raw connection profile)
//! into a [`RemoteCluster`] handle. Handles are built per call and never
//! cached, so a rotated connection profile takes effect on the next request.

pub mod classify;
pub mod connector;
pub mod crd;
pub mod kube_cluster;
pub mod mirror;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;

use crate::domain::{ClusterRegistration, CredentialKind, CredentialResource};
use crate::errors::{BoxError, Result};
use crate::secrets::SecretString;

pub use classify::{classify_transport_error, is_unavailable, kube_error};
pub use connector::{decode_profile, KubeConnector};
pub use crd::{BackupStorage, DatabaseCluster, MonitoringConfig};
pub use kube_cluster::KubeRemoteCluster;

/// Data of a cluster-local `Secret`, keyed by data key
pub type SecretData = BTreeMap<String, SecretString>;

/// Operations against one remote cluster, scoped to the registration's namespace.
#[async_trait]
pub trait RemoteCluster: Send + Sync {
    /// Registration name, used in every error this handle produces
    fn name(&self) -> &str;

    fn namespace(&self) -> &str;

    /// UID of the scoped namespace
    async fn namespace_uid(&self) -> Result<String>;

    async fn list_database_clusters(&self) -> Result<Vec<DatabaseCluster>>;

    async fn get_secret(&self, name: &str) -> Result<Option<SecretData>>;

    /// Create or overwrite a secret, returning the data it held before
    async fn put_secret(&self, name: &str, data: &SecretData) -> Result<Option<SecretData>>;

    /// Absent secrets are not an error
    async fn delete_secret(&self, name: &str) -> Result<()>;

    async fn has_mirror(&self, kind: CredentialKind, name: &str) -> Result<bool>;

    /// Create or overwrite the mirror custom resource for `resource`
    async fn put_mirror(&self, resource: &CredentialResource) -> Result<()>;

    /// Absent mirrors are not an error
    async fn delete_mirror(&self, kind: CredentialKind, name: &str) -> Result<()>;

    /// Send a raw request to the cluster API. The URI carries path and query only.
    ///
    /// Transport failures come back unclassified; see [`classify_transport_error`].
    async fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> std::result::Result<http::Response<Body>, BoxError>;
}

/// Builds [`RemoteCluster`] handles.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    /// Connect using the profile stored in the vault for `registration`
    async fn connect(&self, registration: &ClusterRegistration) -> Result<Arc<dyn RemoteCluster>>;

    /// Connect using a base64-encoded kubeconfig that is not stored yet
    async fn connect_profile(
        &self,
        name: &str,
        namespace: &str,
        profile: &SecretString,
    ) -> Result<Arc<dyn RemoteCluster>>;
}
