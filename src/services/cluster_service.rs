//! Cluster registration service
//!
//! A registration and its connection-profile secret are created and removed
//! together through a [`Saga`], so neither is left behind on failure.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use super::saga::{Compensation, Saga};
use crate::domain::validation::{validate_name, validate_namespace};
use crate::domain::{ClusterId, ClusterRegistration, RegisterClusterRequest, SecretId};
use crate::errors::{ClusterplaneError, Result};
use crate::remote::ClusterConnector;
use crate::secrets::{SecretVault, SecretsError};
use crate::storage::ClusterStore;

/// Options for [`ClusterService::unregister`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnregisterOptions {
    /// Skip the check for remaining database clusters
    pub force: bool,
    /// Proceed when the cluster cannot be reached for that check
    pub ignore_unavailable: bool,
}

/// Service for registering remote clusters
#[derive(Clone)]
pub struct ClusterService {
    store: Arc<dyn ClusterStore>,
    vault: Arc<dyn SecretVault>,
    connector: Arc<dyn ClusterConnector>,
}

impl ClusterService {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        vault: Arc<dyn SecretVault>,
        connector: Arc<dyn ClusterConnector>,
    ) -> Self {
        Self { store, vault, connector }
    }

    /// Register a cluster.
    ///
    /// The profile is decoded and the cluster queried for its namespace UID
    /// before anything is stored.
    #[instrument(skip(self, request), fields(cluster_name = %request.name, namespace = %request.namespace))]
    pub async fn register(&self, request: RegisterClusterRequest) -> Result<ClusterRegistration> {
        validate_name(&request.name)?;
        validate_namespace(&request.namespace)?;
        if self.store.get_by_name(&request.name).await?.is_some() {
            return Err(ClusterplaneError::conflict(
                format!("Kubernetes cluster '{}' already exists", request.name),
                "Kubernetes cluster",
            ));
        }

        let remote = self
            .connector
            .connect_profile(&request.name, &request.namespace, &request.kubeconfig)
            .await?;
        let uid = remote.namespace_uid().await?;

        let mut saga = Saga::begin("register", "cluster", &request.name, self.vault.clone());
        let connection_secret_id = SecretId::new();
        if let Err(err) = self.vault.create(&connection_secret_id, &request.kubeconfig).await {
            return Err(saga.abort(err.into()).await);
        }
        saga.record(Compensation::DeleteSecret { id: connection_secret_id.clone() });

        let now = Utc::now();
        let registration = ClusterRegistration {
            id: ClusterId::new(),
            name: request.name,
            namespace: request.namespace,
            uid,
            connection_secret_id,
            created_at: now,
            updated_at: now,
        };
        let created = match self.store.create(&registration).await {
            Ok(created) => created,
            Err(err) => return Err(saga.abort(err).await),
        };
        saga.commit();

        info!(cluster_id = %created.id, "Kubernetes cluster registered");
        Ok(created)
    }

    /// Remove a registration and its stored connection profile.
    #[instrument(skip(self), fields(cluster_id = %id))]
    pub async fn unregister(&self, id: &ClusterId, options: UnregisterOptions) -> Result<()> {
        let registration = self.store.get(id).await?;

        if !options.force {
            match self.hosted_database_clusters(&registration).await {
                Ok(names) if !names.is_empty() => {
                    return Err(ClusterplaneError::conflict(
                        format!(
                            "Kubernetes cluster '{}' still hosts database clusters: {}. Remove them first or unregister with force",
                            registration.name,
                            names.join(", ")
                        ),
                        "Kubernetes cluster",
                    ));
                }
                Ok(_) => {}
                Err(err @ ClusterplaneError::ClusterUnavailable { .. }) if options.ignore_unavailable => {
                    warn!(cluster = %registration.name, error = %err, "Cluster unavailable, unregistering anyway");
                }
                Err(err) => return Err(err),
            }
        }

        let mut saga = Saga::begin_committed("unregister", "cluster", &registration.name, self.vault.clone());
        match self.vault.delete(&registration.connection_secret_id).await {
            Ok(value) => saga.record(Compensation::RecreateSecret {
                id: registration.connection_secret_id.clone(),
                value,
            }),
            Err(SecretsError::NotFound { .. }) => {
                warn!(secret_id = %registration.connection_secret_id, "Connection profile already absent");
            }
            Err(err) => return Err(saga.abort(err.into()).await),
        }

        if let Err(err) = self.store.delete(id).await {
            return Err(saga.abort(err).await);
        }
        saga.commit();

        info!(cluster_name = %registration.name, "Kubernetes cluster unregistered");
        Ok(())
    }

    async fn hosted_database_clusters(&self, registration: &ClusterRegistration) -> Result<Vec<String>> {
        let remote = self.connector.connect(registration).await?;
        let workloads = remote.list_database_clusters().await?;
        Ok(workloads.into_iter().filter_map(|dbc| dbc.metadata.name).collect())
    }

    pub async fn get(&self, id: &ClusterId) -> Result<ClusterRegistration> {
        self.store.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<ClusterRegistration>> {
        self.store.list().await
    }
}
