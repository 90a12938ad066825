//! In-memory metadata stores for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::repository::{ClusterStore, CredentialStore};
use crate::domain::{ClusterId, ClusterRegistration, CredentialId, CredentialKind, CredentialResource};
use crate::errors::{ClusterplaneError, Result};

#[derive(Debug, Default)]
pub struct MemoryClusterStore {
    rows: RwLock<HashMap<ClusterId, ClusterRegistration>>,
}

impl MemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClusterStore for MemoryClusterStore {
    async fn create(&self, registration: &ClusterRegistration) -> Result<ClusterRegistration> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|r| r.name == registration.name) || rows.contains_key(&registration.id)
        {
            return Err(ClusterplaneError::conflict(
                format!("Kubernetes cluster '{}' already exists", registration.name),
                "Kubernetes cluster",
            ));
        }
        rows.insert(registration.id.clone(), registration.clone());
        Ok(registration.clone())
    }

    async fn get(&self, id: &ClusterId) -> Result<ClusterRegistration> {
        self.rows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ClusterplaneError::not_found("Kubernetes cluster", id.as_str()))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<ClusterRegistration>> {
        Ok(self.rows.read().await.values().find(|r| r.name == name).cloned())
    }

    async fn list(&self) -> Result<Vec<ClusterRegistration>> {
        let mut all: Vec<_> = self.rows.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn delete(&self, id: &ClusterId) -> Result<()> {
        self.rows
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ClusterplaneError::not_found("Kubernetes cluster", id.as_str()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    rows: RwLock<HashMap<CredentialId, CredentialResource>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create(&self, resource: &CredentialResource) -> Result<CredentialResource> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|r| r.name == resource.name) || rows.contains_key(&resource.id) {
            return Err(ClusterplaneError::conflict(
                format!("{} '{}' already exists", resource.kind().label(), resource.name),
                resource.kind().label(),
            ));
        }
        rows.insert(resource.id.clone(), resource.clone());
        Ok(resource.clone())
    }

    async fn get(&self, id: &CredentialId) -> Result<CredentialResource> {
        self.rows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ClusterplaneError::not_found("Credential resource", id.as_str()))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<CredentialResource>> {
        Ok(self.rows.read().await.values().find(|r| r.name == name).cloned())
    }

    async fn list(&self, kind: Option<CredentialKind>) -> Result<Vec<CredentialResource>> {
        let mut all: Vec<_> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| kind.map_or(true, |k| r.kind() == k))
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn update(&self, resource: &CredentialResource) -> Result<CredentialResource> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&resource.id)
            .ok_or_else(|| ClusterplaneError::not_found("Credential resource", resource.id.as_str()))?;
        row.description = resource.description.clone();
        row.spec = resource.spec.clone();
        row.secret_refs = resource.secret_refs.clone();
        row.updated_at = resource.updated_at;
        Ok(row.clone())
    }

    async fn delete(&self, id: &CredentialId) -> Result<()> {
        self.rows
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ClusterplaneError::not_found("Credential resource", id.as_str()))
    }
}
