//! In-use check for credential resources.
//!
//! Only used to veto deletes. A workload references an object-storage
//! resource through its data source or a backup schedule, and a monitoring
//! resource through its monitoring config.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::CredentialKind;
use crate::errors::{ClusterplaneError, ResourceReference, Result};
use crate::remote::{ClusterConnector, DatabaseCluster};
use crate::storage::ClusterStore;

/// Names of the workloads in `workloads` that reference `name`, sorted
pub fn referencing_workloads(
    kind: CredentialKind,
    name: &str,
    workloads: &[DatabaseCluster],
) -> Vec<String> {
    let mut found: Vec<String> = workloads
        .iter()
        .filter(|dbc| match kind {
            CredentialKind::ObjectStorage => dbc.backup_storage_names().contains(&name),
            CredentialKind::Monitoring => dbc.monitoring_config_name() == Some(name),
        })
        .filter_map(|dbc| dbc.metadata.name.clone())
        .collect();
    found.sort();
    found.dedup();
    found
}

#[derive(Clone)]
pub struct ReferenceChecker {
    clusters: Arc<dyn ClusterStore>,
    connector: Arc<dyn ClusterConnector>,
}

impl ReferenceChecker {
    pub fn new(clusters: Arc<dyn ClusterStore>, connector: Arc<dyn ClusterConnector>) -> Self {
        Self { clusters, connector }
    }

    /// Every workload in every registered cluster that references `name`.
    ///
    /// An unreachable cluster fails the whole check.
    #[instrument(skip(self), fields(kind = %kind, resource_name = %name))]
    pub async fn references(
        &self,
        kind: CredentialKind,
        name: &str,
    ) -> Result<Vec<ResourceReference>> {
        let mut references = Vec::new();
        for registration in self.clusters.list().await? {
            let remote = self.connector.connect(&registration).await?;
            let workloads = remote.list_database_clusters().await?;
            let names = referencing_workloads(kind, name, &workloads);
            debug!(cluster = %registration.name, workloads = workloads.len(), hits = names.len(), "Scanned cluster");
            references.extend(names.into_iter().map(|workload| ResourceReference {
                cluster: registration.name.clone(),
                workload,
            }));
        }
        Ok(references)
    }

    /// Fail with [`ClusterplaneError::InUse`] if anything references `name`
    pub async fn ensure_unused(&self, kind: CredentialKind, name: &str) -> Result<()> {
        let references = self.references(kind, name).await?;
        if references.is_empty() {
            return Ok(());
        }
        Err(ClusterplaneError::InUse {
            resource_type: kind.label().to_string(),
            name: name.to_string(),
            references,
        })
    }
}
