//! # Resource Lifecycle Coordinator
//!
//! Create, update and delete of credential resources across the secret
//! vault, the metadata store and the registered clusters. There is no
//! transaction spanning them, so each flow is a [`Saga`]:
//!
//! - create: secrets first, then the metadata row
//! - update: rotate secrets (each rotation mints a new id), then the row
//! - delete: in-use veto, then secrets (values captured), then the row
//!
//! Create and update run their [preflight](crate::preflight) checks before
//! the saga starts: a PMM login is exchanged for an API key and object
//! storage credentials must reach their bucket.
//!
//! Mirrors in remote clusters are written after the stores agree and are
//! never part of the compensation chain.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn, Instrument};

use super::reference_checker::ReferenceChecker;
use super::saga::{Compensation, Saga};
use crate::domain::validation::{apply_update, validate_create};
use crate::domain::{
    CreateCredentialRequest, CredentialId, CredentialKind, CredentialResource, CredentialSpec,
    PmmLogin, SecretField, SecretId, SecretRef, UpdateCredentialRequest,
};
use crate::errors::{ClusterplaneError, Result};
use crate::preflight::{minted_key_name, ApiKeyIssuer, StorageAccessCheck, StorageTarget};
use crate::remote::{mirror, ClusterConnector, RemoteCluster};
use crate::saga_span;
use crate::secrets::{SecretString, SecretVault, SecretsError};
use crate::storage::{ClusterStore, CredentialStore};

/// Coordinates credential resources across the vault, the metadata store
/// and remote clusters.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
    clusters: Arc<dyn ClusterStore>,
    vault: Arc<dyn SecretVault>,
    connector: Arc<dyn ClusterConnector>,
    references: ReferenceChecker,
    preflight: Preflight,
}

/// External checks run before a create or update writes anything
#[derive(Clone)]
pub struct Preflight {
    pub storage: Arc<dyn StorageAccessCheck>,
    pub keys: Arc<dyn ApiKeyIssuer>,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        clusters: Arc<dyn ClusterStore>,
        vault: Arc<dyn SecretVault>,
        connector: Arc<dyn ClusterConnector>,
        preflight: Preflight,
    ) -> Self {
        let references = ReferenceChecker::new(clusters.clone(), connector.clone());
        Self { store, clusters, vault, connector, references, preflight }
    }

    async fn mint_api_key(&self, name: &str, url: &str, login: &PmmLogin) -> Result<SecretString> {
        info!(resource_name = %name, "Minting monitoring API key from login");
        self.preflight.keys.issue_key(url, &minted_key_name(name), login).await
    }

    async fn verify_storage(
        &self,
        spec: &CredentialSpec,
        secrets: &BTreeMap<SecretField, SecretString>,
    ) -> Result<()> {
        let CredentialSpec::ObjectStorage { storage_type, bucket, region, url } = spec else {
            return Ok(());
        };
        let (Some(access_key), Some(secret_key)) =
            (secrets.get(&SecretField::AccessKey), secrets.get(&SecretField::SecretKey))
        else {
            return Err(ClusterplaneError::validation(
                "'access_key' and 'secret_key' are required to check storage access",
            ));
        };
        let target = StorageTarget {
            storage_type: *storage_type,
            bucket: bucket.clone(),
            region: region.clone(),
            url: url.clone(),
            access_key: access_key.clone(),
            secret_key: secret_key.clone(),
        };
        self.preflight.storage.verify(&target).await
    }

    /// Create a resource and its secrets.
    ///
    /// Nothing is written unless the request validates and the name is free.
    /// Any failure after the first secret is written unwinds what was
    /// written.
    pub async fn create(&self, request: CreateCredentialRequest) -> Result<CredentialResource> {
        let kind = request.spec.kind();
        let span = saga_span!("create", kind, request.name);
        self.create_inner(request).instrument(span).await
    }

    async fn create_inner(&self, mut request: CreateCredentialRequest) -> Result<CredentialResource> {
        validate_create(&request)?;
        let kind = request.spec.kind();
        if self.store.get_by_name(&request.name).await?.is_some() {
            return Err(ClusterplaneError::conflict(
                format!("{} '{}' already exists", kind.label(), request.name),
                kind.label(),
            ));
        }

        if let (Some(login), CredentialSpec::Monitoring { url, .. }) = (&request.pmm_login, &request.spec) {
            let key = self.mint_api_key(&request.name, url, login).await?;
            request.secrets.insert(SecretField::ApiKey, key);
        }
        self.verify_storage(&request.spec, &request.secrets).await?;

        let id = CredentialId::new();
        tracing::Span::current().record("resource_id", id.as_str());

        let mut saga = Saga::begin("create", kind.as_str(), &request.name, self.vault.clone());
        let mut secret_refs = Vec::with_capacity(kind.secret_fields().len());
        for field in kind.secret_fields() {
            let Some(value) = request.secrets.get(field) else {
                return Err(saga.abort(ClusterplaneError::validation_field(
                    format!("'{}' is required", field),
                    field.as_str(),
                ))
                .await);
            };
            let secret_id = SecretId::new();
            if let Err(err) = self.vault.create(&secret_id, value).await {
                return Err(saga.abort(err.into()).await);
            }
            saga.record(Compensation::DeleteSecret { id: secret_id.clone() });
            secret_refs.push(SecretRef { field: *field, id: secret_id });
        }

        let now = Utc::now();
        let resource = CredentialResource {
            id,
            name: request.name,
            description: request.description,
            spec: request.spec,
            secret_refs,
            created_at: now,
            updated_at: now,
        };
        let created = match self.store.create(&resource).await {
            Ok(created) => created,
            Err(err) => return Err(saga.abort(err).await),
        };
        saga.commit();

        info!(resource_id = %created.id, resource_name = %created.name, kind = %kind, "Credential resource created");
        Ok(created)
    }

    /// Change the provided fields of a resource.
    ///
    /// Each supplied secret is rotated to a fresh id. If the metadata update
    /// fails, every rotation is reverted newest-first and the stored record
    /// is left as it was.
    pub async fn update(
        &self,
        kind: CredentialKind,
        id: &CredentialId,
        request: UpdateCredentialRequest,
    ) -> Result<CredentialResource> {
        let current = self.get(kind, id).await?;
        let span = saga_span!("update", kind, current.name);
        span.record("resource_id", id.as_str());
        let updated = self.update_inner(current, request).instrument(span).await?;

        self.push_mirrors(&updated).await;
        Ok(updated)
    }

    async fn update_inner(
        &self,
        current: CredentialResource,
        mut request: UpdateCredentialRequest,
    ) -> Result<CredentialResource> {
        let spec = apply_update(&current, &request)?;

        if let (Some(login), CredentialSpec::Monitoring { url, .. }) = (&request.pmm_login, &spec) {
            let key = self.mint_api_key(&current.name, url, login).await?;
            request.secrets.insert(SecretField::ApiKey, key);
        }
        if current.kind() == CredentialKind::ObjectStorage {
            let mut merged = self.secret_values(&current).await?;
            merged.extend(request.secrets.iter().map(|(field, value)| (*field, value.clone())));
            self.verify_storage(&spec, &merged).await?;
        }

        let mut saga =
            Saga::begin_committed("update", current.kind().as_str(), &current.name, self.vault.clone());
        let mut secret_refs = current.secret_refs.clone();
        for (field, value) in &request.secrets {
            let Some(slot) = secret_refs.iter_mut().find(|r| r.field == *field) else {
                return Err(saga
                    .abort(ClusterplaneError::internal(format!(
                        "{} '{}' has no stored '{}'",
                        current.kind().label(),
                        current.name,
                        field
                    )))
                    .await);
            };
            let original_id = slot.id.clone();
            let rotated_id = SecretId::new();
            match self.vault.replace(&original_id, &rotated_id, value).await {
                Ok(previous) => {
                    saga.record(Compensation::RestoreSecret {
                        current_id: rotated_id.clone(),
                        original_id,
                        value: previous,
                    });
                    slot.id = rotated_id;
                }
                Err(err) => return Err(saga.abort(err.into()).await),
            }
        }

        let candidate = CredentialResource {
            description: request.description.clone().or_else(|| current.description.clone()),
            spec,
            secret_refs,
            updated_at: Utc::now(),
            ..current
        };
        let updated = match self.store.update(&candidate).await {
            Ok(updated) => updated,
            Err(err) => return Err(saga.abort(err).await),
        };
        saga.commit();

        info!(
            resource_id = %updated.id,
            resource_name = %updated.name,
            rotated = request.secrets.len(),
            "Credential resource updated"
        );
        Ok(updated)
    }

    /// Delete a resource unless a workload in any registered cluster uses it.
    pub async fn delete(&self, kind: CredentialKind, id: &CredentialId) -> Result<()> {
        let current = self.get(kind, id).await?;
        let span = saga_span!("delete", kind, current.name);
        span.record("resource_id", id.as_str());
        self.delete_inner(&current).instrument(span).await?;

        self.remove_mirrors(&current).await;
        Ok(())
    }

    async fn delete_inner(&self, current: &CredentialResource) -> Result<()> {
        self.references.ensure_unused(current.kind(), &current.name).await?;

        let mut saga =
            Saga::begin_committed("delete", current.kind().as_str(), &current.name, self.vault.clone());
        for secret_ref in &current.secret_refs {
            match self.vault.delete(&secret_ref.id).await {
                Ok(value) => {
                    saga.record(Compensation::RecreateSecret { id: secret_ref.id.clone(), value })
                }
                Err(SecretsError::NotFound { .. }) => {
                    warn!(secret_id = %secret_ref.id, field = %secret_ref.field, "Secret already absent");
                }
                Err(err) => return Err(saga.abort(err.into()).await),
            }
        }

        if let Err(err) = self.store.delete(&current.id).await {
            return Err(saga.abort(err).await);
        }
        saga.commit();

        info!(resource_id = %current.id, resource_name = %current.name, "Credential resource deleted");
        Ok(())
    }

    /// Descriptor of one resource; fails with `NotFound` if it is of another kind
    pub async fn get(&self, kind: CredentialKind, id: &CredentialId) -> Result<CredentialResource> {
        let resource = self.store.get(id).await.map_err(|err| match err {
            ClusterplaneError::NotFound { .. } => ClusterplaneError::not_found(kind.label(), id.as_str()),
            other => other,
        })?;
        if resource.kind() != kind {
            return Err(ClusterplaneError::not_found(kind.label(), id.as_str()));
        }
        Ok(resource)
    }

    pub async fn list(&self, kind: CredentialKind) -> Result<Vec<CredentialResource>> {
        self.store.list(Some(kind)).await
    }

    /// Make sure `remote` hosts a mirror for each of `names`.
    ///
    /// Writes the cluster-local secret, then the mirror resource. If the
    /// mirror write fails the secret is put back the way it was.
    #[instrument(skip(self, remote, names), fields(cluster = %remote.name(), kind = %kind))]
    pub async fn ensure_mirrors(
        &self,
        remote: &dyn RemoteCluster,
        kind: CredentialKind,
        names: &[String],
    ) -> Result<()> {
        for name in names {
            let resource = self
                .store
                .get_by_name(name)
                .await?
                .filter(|r| r.kind() == kind)
                .ok_or_else(|| ClusterplaneError::not_found(kind.label(), name.as_str()))?;
            self.write_mirror(remote, &resource).await?;
        }
        Ok(())
    }

    async fn write_mirror(&self, remote: &dyn RemoteCluster, resource: &CredentialResource) -> Result<()> {
        let values = self.secret_values(resource).await?;
        let secret_name = mirror::secret_name(&resource.name);
        let previous = remote.put_secret(&secret_name, &mirror::secret_data(&values)).await?;

        if let Err(err) = remote.put_mirror(resource).await {
            let restored = match &previous {
                Some(data) => remote.put_secret(&secret_name, data).await.map(|_| ()),
                None => remote.delete_secret(&secret_name).await,
            };
            if let Err(restore_err) = restored {
                error!(
                    cluster = %remote.name(),
                    secret = %secret_name,
                    error = %restore_err,
                    "Failed to roll back cluster secret, manual intervention required"
                );
            }
            return Err(err);
        }

        info!(cluster = %remote.name(), resource_name = %resource.name, "Mirror written");
        Ok(())
    }

    async fn secret_values(
        &self,
        resource: &CredentialResource,
    ) -> Result<BTreeMap<SecretField, SecretString>> {
        let mut values = BTreeMap::new();
        for secret_ref in &resource.secret_refs {
            values.insert(secret_ref.field, self.vault.get(&secret_ref.id).await?);
        }
        Ok(values)
    }

    async fn connected_clusters(&self) -> Vec<Arc<dyn RemoteCluster>> {
        let registrations = match self.clusters.list().await {
            Ok(registrations) => registrations,
            Err(err) => {
                warn!(error = %err, "Failed to list clusters for mirror sync");
                return Vec::new();
            }
        };
        let mut connected = Vec::with_capacity(registrations.len());
        for registration in &registrations {
            match self.connector.connect(registration).await {
                Ok(remote) => connected.push(remote),
                Err(err) => {
                    warn!(cluster = %registration.name, error = %err, "Skipping cluster for mirror sync")
                }
            }
        }
        connected
    }

    /// Refresh existing mirrors after an update. Failures are logged only.
    async fn push_mirrors(&self, resource: &CredentialResource) {
        for remote in self.connected_clusters().await {
            let synced = match remote.has_mirror(resource.kind(), &resource.name).await {
                Ok(true) => self.write_mirror(remote.as_ref(), resource).await,
                Ok(false) => continue,
                Err(err) => Err(err),
            };
            if let Err(err) = synced {
                warn!(cluster = %remote.name(), resource_name = %resource.name, error = %err, "Mirror refresh failed");
            }
        }
    }

    /// Remove mirrors after a delete. Failures are logged only.
    async fn remove_mirrors(&self, resource: &CredentialResource) {
        let secret_name = mirror::secret_name(&resource.name);
        for remote in self.connected_clusters().await {
            let removed = match remote.delete_mirror(resource.kind(), &resource.name).await {
                Ok(()) => remote.delete_secret(&secret_name).await,
                Err(err) => Err(err),
            };
            if let Err(err) = removed {
                warn!(cluster = %remote.name(), resource_name = %resource.name, error = %err, "Mirror removal failed");
            }
        }
    }
}
