//! [`RemoteCluster`] over a namespaced [`kube::Client`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::Client;
use tracing::{debug, instrument};

use super::classify::kube_error;
use super::crd::{BackupStorage, DatabaseCluster, MonitoringConfig};
use super::mirror::{backup_storage_spec, monitoring_config_spec};
use super::{RemoteCluster, SecretData};
use crate::domain::{CredentialKind, CredentialResource};
use crate::errors::{BoxError, ClusterplaneError, Result};
use crate::secrets::SecretString;

const FIELD_MANAGER: &str = "clusterplane";

pub struct KubeRemoteCluster {
    client: Client,
    name: String,
    namespace: String,
    request_timeout: Duration,
}

impl KubeRemoteCluster {
    pub fn new(client: Client, name: &str, namespace: &str, request_timeout: Duration) -> Self {
        Self {
            client,
            name: name.to_string(),
            namespace: namespace.to_string(),
            request_timeout,
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn err(&self, e: kube::Error) -> ClusterplaneError {
        kube_error(&self.name, e)
    }

    fn apply_params() -> PatchParams {
        PatchParams::apply(FIELD_MANAGER).force()
    }
}

fn decode_secret(secret: Secret) -> SecretData {
    secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, ByteString(bytes))| (key, SecretString::new(String::from_utf8_lossy(&bytes))))
        .collect()
}

#[async_trait]
impl RemoteCluster for KubeRemoteCluster {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    #[instrument(skip(self), fields(cluster = %self.name, namespace = %self.namespace))]
    async fn namespace_uid(&self) -> Result<String> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let namespace = namespaces.get(&self.namespace).await.map_err(|e| self.err(e))?;
        namespace.metadata.uid.ok_or_else(|| {
            ClusterplaneError::upstream(
                &self.name,
                format!("namespace '{}' has no uid", self.namespace),
            )
        })
    }

    #[instrument(skip(self), fields(cluster = %self.name))]
    async fn list_database_clusters(&self) -> Result<Vec<DatabaseCluster>> {
        let list = self
            .api::<DatabaseCluster>()
            .list(&ListParams::default())
            .await
            .map_err(|e| self.err(e))?;
        Ok(list.items)
    }

    async fn get_secret(&self, name: &str) -> Result<Option<SecretData>> {
        let secret = self.api::<Secret>().get_opt(name).await.map_err(|e| self.err(e))?;
        Ok(secret.map(decode_secret))
    }

    #[instrument(skip(self, data), fields(cluster = %self.name, secret = %name))]
    async fn put_secret(&self, name: &str, data: &SecretData) -> Result<Option<SecretData>> {
        let api = self.api::<Secret>();
        let previous = api.get_opt(name).await.map_err(|e| self.err(e))?.map(decode_secret);

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.clone(), ByteString(v.expose_secret().as_bytes().to_vec())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        };
        api.patch(name, &Self::apply_params(), &Patch::Apply(&secret))
            .await
            .map_err(|e| self.err(e))?;

        debug!(replaced = previous.is_some(), "Applied cluster secret");
        Ok(previous)
    }

    #[instrument(skip(self), fields(cluster = %self.name, secret = %name))]
    async fn delete_secret(&self, name: &str) -> Result<()> {
        match self.api::<Secret>().delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(status)) if status.code == 404 => Ok(()),
            Err(e) => Err(self.err(e)),
        }
    }

    async fn has_mirror(&self, kind: CredentialKind, name: &str) -> Result<bool> {
        let found = match kind {
            CredentialKind::ObjectStorage => {
                self.api::<BackupStorage>().get_opt(name).await.map(|o| o.is_some())
            }
            CredentialKind::Monitoring => {
                self.api::<MonitoringConfig>().get_opt(name).await.map(|o| o.is_some())
            }
        };
        found.map_err(|e| self.err(e))
    }

    #[instrument(skip(self, resource), fields(cluster = %self.name, resource_name = %resource.name))]
    async fn put_mirror(&self, resource: &CredentialResource) -> Result<()> {
        let params = Self::apply_params();
        let applied = if let Some(spec) = backup_storage_spec(resource) {
            let mut mirror = BackupStorage::new(&resource.name, spec);
            mirror.metadata.namespace = Some(self.namespace.clone());
            self.api::<BackupStorage>()
                .patch(&resource.name, &params, &Patch::Apply(&mirror))
                .await
                .map(|_| ())
        } else if let Some(spec) = monitoring_config_spec(resource) {
            let mut mirror = MonitoringConfig::new(&resource.name, spec);
            mirror.metadata.namespace = Some(self.namespace.clone());
            self.api::<MonitoringConfig>()
                .patch(&resource.name, &params, &Patch::Apply(&mirror))
                .await
                .map(|_| ())
        } else {
            Ok(())
        };
        applied.map_err(|e| self.err(e))
    }

    #[instrument(skip(self), fields(cluster = %self.name, resource_name = %name))]
    async fn delete_mirror(&self, kind: CredentialKind, name: &str) -> Result<()> {
        let params = DeleteParams::default();
        let deleted = match kind {
            CredentialKind::ObjectStorage => {
                self.api::<BackupStorage>().delete(name, &params).await.map(|_| ())
            }
            CredentialKind::Monitoring => {
                self.api::<MonitoringConfig>().delete(name, &params).await.map(|_| ())
            }
        };
        match deleted {
            Ok(()) => Ok(()),
            Err(kube::Error::Api(status)) if status.code == 404 => Ok(()),
            Err(e) => Err(self.err(e)),
        }
    }

    async fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> std::result::Result<http::Response<Body>, BoxError> {
        let request = request.map(|body| kube::client::Body::from(body.to_vec()));
        let response = tokio::time::timeout(self.request_timeout, self.client.send(request))
            .await
            .map_err(|elapsed| Box::new(elapsed) as BoxError)?
            .map_err(|e| Box::new(e) as BoxError)?;
        Ok(response.map(Body::new))
    }
}
