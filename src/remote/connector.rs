//! kube-backed [`ClusterConnector`].

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tracing::{debug, instrument};

use super::kube_cluster::KubeRemoteCluster;
use super::{ClusterConnector, RemoteCluster};
use crate::config::RemoteConfig;
use crate::domain::ClusterRegistration;
use crate::errors::{ClusterplaneError, Result};
use crate::secrets::{SecretString, SecretVault};

/// Decode a base64-encoded kubeconfig.
///
/// Every failure is reported as [`ClusterplaneError::MalformedConnectionProfile`].
pub fn decode_profile(cluster: &str, profile: &SecretString) -> Result<Kubeconfig> {
    let malformed = |reason: String| ClusterplaneError::MalformedConnectionProfile {
        cluster: cluster.to_string(),
        reason,
    };

    let raw = STANDARD
        .decode(profile.expose_secret().trim())
        .map_err(|e| malformed(format!("not valid base64: {}", e)))?;
    let yaml = std::str::from_utf8(&raw).map_err(|_| malformed("not valid UTF-8".to_string()))?;
    Kubeconfig::from_yaml(yaml).map_err(|e| malformed(format!("not a kubeconfig: {}", e)))
}

/// Builds a fresh [`kube::Client`] for every call.
#[derive(Clone)]
pub struct KubeConnector {
    vault: Arc<dyn SecretVault>,
    config: RemoteConfig,
}

impl KubeConnector {
    pub fn new(vault: Arc<dyn SecretVault>, config: RemoteConfig) -> Self {
        Self { vault, config }
    }

    async fn client(&self, cluster: &str, profile: &SecretString) -> Result<Client> {
        let kubeconfig = decode_profile(cluster, profile)?;

        let mut config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| ClusterplaneError::MalformedConnectionProfile {
                cluster: cluster.to_string(),
                reason: e.to_string(),
            })?;
        config.connect_timeout = Some(self.config.connect_timeout());
        config.read_timeout = Some(self.config.read_timeout());

        Client::try_from(config).map_err(|e| ClusterplaneError::MalformedConnectionProfile {
            cluster: cluster.to_string(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for KubeConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeConnector").field("config", &self.config).finish_non_exhaustive()
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    #[instrument(skip(self, registration), fields(cluster = %registration.name))]
    async fn connect(&self, registration: &ClusterRegistration) -> Result<Arc<dyn RemoteCluster>> {
        let profile = self.vault.get(&registration.connection_secret_id).await?;
        self.connect_profile(&registration.name, &registration.namespace, &profile).await
    }

    async fn connect_profile(
        &self,
        name: &str,
        namespace: &str,
        profile: &SecretString,
    ) -> Result<Arc<dyn RemoteCluster>> {
        let client = self.client(name, profile).await?;
        debug!(cluster = %name, namespace = %namespace, "Built remote cluster client");
        Ok(Arc::new(KubeRemoteCluster::new(
            client,
            name,
            namespace,
            self.config.proxy_timeout(),
        )))
    }
}
